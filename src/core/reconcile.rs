//! Merges candidate lists from all sources into one snapshot

use crate::core::asset::{Asset, AssetCategory, CandidateAsset, Provenance, Snapshot};
use crate::core::demo::{demo_gold_price, demo_snapshot};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Tickers allowed into the feed. A symbol passes when it equals or
/// contains one of these.
pub const ALLOWED_SYMBOLS: &[&str] = &[
    // Fiat
    "USD", "EUR", "GBP", "AED",
    // Gold and coins
    "GOLD18", "COIN", "EMAMI", "BAHAR", "HALF", "QUARTER", "GRAM",
    // Crypto
    "BTC", "USDT", "ETH", "TRX", "TON", "DOGE",
];

const USD_ID: &str = "usd";
const USDT_ID: &str = "usdt";

/// Counts of what happened to each candidate during one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub accepted: usize,
    pub missing_id: usize,
    pub duplicate: usize,
    pub not_allowed: usize,
    pub derived_usd: bool,
    pub used_demo: bool,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    allowed: Vec<String>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ALLOWED_SYMBOLS.iter().map(|s| s.to_string()))
    }
}

impl Reconciler {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|s| s.to_uppercase()).collect(),
        }
    }

    pub fn is_allowed(&self, symbol: &str) -> bool {
        let symbol = symbol.to_uppercase();
        self.allowed
            .iter()
            .any(|allowed| symbol.contains(allowed.as_str()) || *allowed == symbol)
    }

    pub fn reconcile(&self, lists: Vec<Vec<CandidateAsset>>, now: DateTime<Utc>) -> Snapshot {
        self.reconcile_with_stats(lists, now).0
    }

    /// `lists` must be in source priority order: on duplicate ids the first
    /// candidate seen wins.
    pub fn reconcile_with_stats(
        &self,
        lists: Vec<Vec<CandidateAsset>>,
        now: DateTime<Utc>,
    ) -> (Snapshot, ReconcileStats) {
        let mut stats = ReconcileStats::default();
        let mut seen = HashSet::new();
        let mut accepted: Vec<Asset> = Vec::new();

        for mut candidate in lists.into_iter().flatten() {
            if candidate.id.trim().is_empty() {
                stats.missing_id += 1;
                continue;
            }

            let id = candidate.id.to_lowercase();
            if seen.contains(&id) {
                debug!(id = %id, provenance = %candidate.provenance(), "Dropping duplicate candidate");
                stats.duplicate += 1;
                continue;
            }

            if !self.is_allowed(&candidate.symbol) {
                debug!(id = %id, symbol = %candidate.symbol, "Dropping candidate outside the allow-list");
                stats.not_allowed += 1;
                continue;
            }

            candidate.id = id.clone();
            seen.insert(id);
            accepted.push(candidate);
        }

        if !seen.contains(USD_ID) {
            if let Some(usd) = accepted.iter().find(|a| a.id == USDT_ID).map(derive_usd) {
                debug!("No USD quote upstream, deriving it from USDT");
                accepted.push(usd);
                stats.derived_usd = true;
            }
        }

        stats.accepted = accepted.len();
        debug!(?stats, "Reconciled candidates");

        if accepted.is_empty() {
            warn!("No upstream data available, serving demonstration prices");
            stats.used_demo = true;
            return (demo_snapshot(now), stats);
        }

        (Snapshot::new(accepted, now), stats)
    }
}

fn derive_usd(usdt: &Asset) -> Asset {
    Asset::new(
        USD_ID,
        "USD",
        AssetCategory::Fiat,
        usdt.price,
        Provenance::DerivedFromUsdt,
    )
    .with_names("دلار آمریکا (تتر)", "US Dollar")
    .with_change(usdt.change_24h())
    .observed(usdt.observed_at)
}

/// True when live aggregator data is unavailable and a derived or
/// placeholder value is being shown.
pub fn fallback_mode(snapshot: &Snapshot) -> bool {
    let derived_usd = snapshot
        .get(USD_ID)
        .is_some_and(|usd| usd.provenance() == Provenance::DerivedFromUsdt);
    let gold_placeholder = snapshot.assets.iter().any(|a| {
        a.category() == AssetCategory::PreciousMetal
            && a.provenance() == Provenance::Demo
            && a.price.major() == demo_gold_price().major()
    });
    derived_usd || gold_placeholder
}
