//! Asset and snapshot types shared by the adapters, the reconciler and the feed

use crate::core::price::Price;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Fiat,
    PreciousMetal,
    Crypto,
}

impl Display for AssetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetCategory::Fiat => "fiat",
                AssetCategory::PreciousMetal => "gold",
                AssetCategory::Crypto => "crypto",
            }
        )
    }
}

impl FromStr for AssetCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fiat" | "currency" => Ok(AssetCategory::Fiat),
            "gold" | "metal" | "precious_metal" => Ok(AssetCategory::PreciousMetal),
            "crypto" => Ok(AssetCategory::Crypto),
            _ => Err(anyhow!("Invalid asset category: {}", s)),
        }
    }
}

/// Where a record came from. Used for priority and fallback detection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Nobitex,
    BrsApi,
    /// USD synthesized from the USDT quote because the aggregator had none.
    DerivedFromUsdt,
    /// Built-in demonstration data.
    Demo,
}

impl Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Provenance::Nobitex => "nobitex",
                Provenance::BrsApi => "brsapi",
                Provenance::DerivedFromUsdt => "nobitex (usdt)",
                Provenance::Demo => "demo",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub name_local: String,
    pub name_global: String,
    category: AssetCategory,
    pub price: Price,
    change_24h: f64,
    pub observed_at: DateTime<Utc>,
    provenance: Provenance,
}

/// An adapter-produced record that has not been reconciled yet.
pub type CandidateAsset = Asset;

impl Asset {
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        category: AssetCategory,
        price: Price,
        provenance: Provenance,
    ) -> Self {
        let id = id.into();
        Self {
            name_local: id.clone(),
            name_global: id.clone(),
            id,
            symbol: symbol.into(),
            category,
            price,
            change_24h: 0.0,
            observed_at: Utc::now(),
            provenance,
        }
    }

    pub fn with_names(mut self, local: impl Into<String>, global: impl Into<String>) -> Self {
        self.name_local = local.into();
        self.name_global = global.into();
        self
    }

    /// Non-finite changes are stored as zero.
    pub fn with_change(mut self, change_24h: f64) -> Self {
        self.change_24h = if change_24h.is_finite() {
            change_24h
        } else {
            0.0
        };
        self
    }

    pub fn observed(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }

    pub fn category(&self) -> AssetCategory {
        self.category
    }

    pub fn change_24h(&self) -> f64 {
        self.change_24h
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

/// A reconciled, ordered list of assets. Superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub assets: Vec<Asset>,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(assets: Vec<Asset>, captured_at: DateTime<Utc>) -> Self {
        Self {
            assets,
            captured_at,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// True when every asset is demonstration data.
    pub fn is_demo(&self) -> bool {
        !self.assets.is_empty()
            && self
                .assets
                .iter()
                .all(|a| a.provenance == Provenance::Demo)
    }
}
