//! Rial/Toman price pair

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Number of minor units (Rial) in one major unit (Toman).
pub const MINOR_PER_MAJOR: Decimal = Decimal::TEN;

/// A price expressed in both denominations.
///
/// Only the constructors can build a `Price`, so `minor == major * 10` holds
/// for every value in the program, including deserialized ones: the stored
/// major value is ignored and recomputed from the minor one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PriceRecord", into = "PriceRecord")]
pub struct Price {
    minor: Decimal,
    major: Decimal,
}

impl Price {
    pub fn from_minor(minor: Decimal) -> Self {
        Self {
            minor,
            major: minor / MINOR_PER_MAJOR,
        }
    }

    pub fn from_major(major: Decimal) -> Self {
        Self {
            minor: major * MINOR_PER_MAJOR,
            major,
        }
    }

    /// Price in Rial.
    pub fn minor(&self) -> Decimal {
        self.minor
    }

    /// Price in Toman.
    pub fn major(&self) -> Decimal {
        self.major
    }
}

impl Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Toman ({} Rial)", self.major, self.minor)
    }
}

#[derive(Serialize, Deserialize)]
struct PriceRecord {
    minor: Decimal,
    major: Decimal,
}

impl From<PriceRecord> for Price {
    fn from(record: PriceRecord) -> Self {
        Price::from_minor(record.minor)
    }
}

impl From<Price> for PriceRecord {
    fn from(price: Price) -> Self {
        PriceRecord {
            minor: price.minor,
            major: price.major,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_minor_divides_by_ten() {
        let price = Price::from_minor(Decimal::from(850_000));
        assert_eq!(price.minor(), Decimal::from(850_000));
        assert_eq!(price.major(), Decimal::from(85_000));
    }

    #[test]
    fn test_ratio_is_exact_for_odd_values() {
        let price = Price::from_minor(Decimal::from_str("1234567.89").unwrap());
        assert_eq!(price.major(), Decimal::from_str("123456.789").unwrap());
        assert_eq!(price.major() * MINOR_PER_MAJOR, price.minor());
    }

    #[test]
    fn test_deserialize_recomputes_major() {
        let json = r#"{"minor":"600000","major":"1"}"#;
        let price: Price = serde_json::from_str(json).unwrap();
        assert_eq!(price.major(), Decimal::from(60_000));
    }
}
