//! Rial/Toman magnitude correction
//!
//! The aggregator reports some quotes in Rial and some in Toman, and now and
//! then drops a trailing zero. Each price class has a realistic band, so a
//! single threshold per class is enough to decide which unit a raw value is
//! in: above the threshold it is Rial, otherwise it is Toman.

use crate::core::price::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const COIN_MARKERS: &[&str] = &[
    "سکه", "coin", "emami", "bahar", "rob", "nim", "quarter", "half",
];
const GRAM_MARKERS: &[&str] = &["گرم", "gram", "18k"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceClass {
    Fiat,
    /// Gold quoted per gram.
    GoldGram,
    /// Gold coins, and any metal quote that is not per gram.
    GoldCoin,
}

impl PriceClass {
    /// Coin markers win over gram markers, so "Emami coin (8 gram)" is a coin.
    pub fn classify_metal(name: &str, slug: &str) -> Self {
        let haystack = format!("{}{}", name, slug).to_lowercase();
        let is_coin = COIN_MARKERS.iter().any(|m| haystack.contains(m));
        let is_gram = GRAM_MARKERS.iter().any(|m| haystack.contains(m));

        if is_gram && !is_coin {
            PriceClass::GoldGram
        } else {
            PriceClass::GoldCoin
        }
    }
}

/// Turns a raw upstream number into a consistent Rial/Toman pair.
pub trait UnitNormalizer: Send + Sync {
    fn normalize(&self, raw: Decimal, class: PriceClass) -> Price;
}

/// Threshold per price class, in raw upstream units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdNormalizer {
    pub fiat: u64,
    pub gold_gram: u64,
    pub gold_coin: u64,
}

impl Default for ThresholdNormalizer {
    fn default() -> Self {
        Self {
            fiat: 200_000,
            gold_gram: 50_000_000,
            gold_coin: 500_000_000,
        }
    }
}

impl ThresholdNormalizer {
    fn threshold(&self, class: PriceClass) -> Decimal {
        Decimal::from(match class {
            PriceClass::Fiat => self.fiat,
            PriceClass::GoldGram => self.gold_gram,
            PriceClass::GoldCoin => self.gold_coin,
        })
    }
}

impl UnitNormalizer for ThresholdNormalizer {
    fn normalize(&self, raw: Decimal, class: PriceClass) -> Price {
        if raw > self.threshold(class) {
            Price::from_minor(raw)
        } else {
            Price::from_major(raw)
        }
    }
}
