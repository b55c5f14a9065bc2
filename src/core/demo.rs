//! Built-in demonstration dataset, served when every upstream is unreachable.

use crate::core::asset::{Asset, AssetCategory, Provenance, Snapshot};
use crate::core::price::Price;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Toman price of the demonstration 18k gold quote. A live feed reporting
/// this exact value with demo provenance means the placeholder leaked.
pub const DEMO_GOLD_TOMAN: u64 = 4_500_000;

// (id, symbol, category, Persian name, English name, Toman price, 24h change)
const DEMO_ASSETS: &[(&str, &str, AssetCategory, &str, &str, u64, f64)] = &[
    ("usd", "USD", AssetCategory::Fiat, "دلار آمریکا", "US Dollar", 60_000, 0.5),
    ("eur", "EUR", AssetCategory::Fiat, "یورو", "Euro", 65_500, 0.3),
    ("gbp", "GBP", AssetCategory::Fiat, "پوند انگلیس", "British Pound", 76_000, -0.2),
    ("aed", "AED", AssetCategory::Fiat, "درهم امارات", "UAE Dirham", 16_350, 0.4),
    (
        "gold_18k",
        "GOLD18",
        AssetCategory::PreciousMetal,
        "طلای ۱۸ عیار",
        "Gold 18k (gram)",
        DEMO_GOLD_TOMAN,
        1.1,
    ),
    (
        "coin_emami",
        "COIN_EMAMI",
        AssetCategory::PreciousMetal,
        "سکه امامی",
        "Emami Coin",
        45_000_000,
        0.8,
    ),
    (
        "coin_bahar",
        "COIN_BAHAR",
        AssetCategory::PreciousMetal,
        "سکه بهار آزادی",
        "Bahar Azadi Coin",
        42_000_000,
        0.7,
    ),
    (
        "coin_half",
        "COIN_HALF",
        AssetCategory::PreciousMetal,
        "نیم سکه",
        "Half Coin",
        24_000_000,
        0.6,
    ),
    (
        "coin_quarter",
        "COIN_QUARTER",
        AssetCategory::PreciousMetal,
        "ربع سکه",
        "Quarter Coin",
        14_000_000,
        0.5,
    ),
    ("btc", "BTC", AssetCategory::Crypto, "بیت‌کوین", "Bitcoin", 5_800_000_000, 2.3),
    ("eth", "ETH", AssetCategory::Crypto, "اتریوم", "Ethereum", 220_000_000, 1.9),
    ("usdt", "USDT", AssetCategory::Crypto, "تتر", "Tether", 61_000, 0.1),
];

pub fn demo_gold_price() -> Price {
    Price::from_major(Decimal::from(DEMO_GOLD_TOMAN))
}

pub fn demo_snapshot(captured_at: DateTime<Utc>) -> Snapshot {
    let assets = DEMO_ASSETS
        .iter()
        .map(|(id, symbol, category, local, global, toman, change)| {
            Asset::new(
                *id,
                *symbol,
                *category,
                Price::from_major(Decimal::from(*toman)),
                Provenance::Demo,
            )
            .with_names(*local, *global)
            .with_change(*change)
            .observed(captured_at)
        })
        .collect();

    Snapshot::new(assets, captured_at)
}
