//! Decimal value types
//!
//! `Price` and `Quantity` wrap `rust_decimal::Decimal` so the engine never
//! touches floating point. A price is strictly positive for its whole life;
//! a quantity starts positive but legitimately reaches zero as an order
//! fills down. Both cross JSON as strings, since JSON numbers cannot carry
//! the full decimal precision.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// A strictly positive price.
///
/// Total ordering comes straight from the inner decimal, which is what the
/// book relies on for its level maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Validate and wrap a decimal; zero and negatives are refused.
    pub fn try_new(value: Decimal) -> Option<Self> {
        (value > Decimal::ZERO).then_some(Self(value))
    }

    /// Whole-unit price, handy in tests and fixtures.
    ///
    /// # Panics
    /// When `units` is zero.
    pub fn from_u64(units: u64) -> Self {
        Self::try_new(Decimal::from(units)).expect("literal price must be positive")
    }

    /// Parse a decimal string such as `"50000.25"`.
    ///
    /// # Panics
    /// When the parsed value is not strictly positive.
    pub fn from_str(text: &str) -> Result<Self, rust_decimal::Error> {
        let value = Decimal::from_str(text)?;
        Ok(Self::try_new(value).expect("parsed price must be positive"))
    }

    /// The raw decimal, for arithmetic at the call site.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

/// A non-negative amount of the base asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Validate and wrap a strictly positive decimal.
    pub fn try_new(value: Decimal) -> Option<Self> {
        (value > Decimal::ZERO).then_some(Self(value))
    }

    /// The zero amount, where filled and remaining counters start and end.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Whole-unit quantity, handy in tests and fixtures.
    ///
    /// # Panics
    /// When `units` is zero.
    pub fn from_u64(units: u64) -> Self {
        Self::try_new(Decimal::from(units)).expect("literal quantity must be positive")
    }

    /// Parse a decimal string such as `"0.25"`.
    ///
    /// # Panics
    /// When the parsed value is not strictly positive.
    pub fn from_str(text: &str) -> Result<Self, rust_decimal::Error> {
        let value = Decimal::from_str(text)?;
        Ok(Self::try_new(value).expect("parsed quantity must be positive"))
    }

    /// The raw decimal, for arithmetic at the call site.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtraction that reports underflow instead of going negative.
    pub fn checked_sub(&self, rhs: Quantity) -> Option<Quantity> {
        (self.0 >= rhs.0).then(|| Self(self.0 - rhs.0))
    }

    /// The smaller of two amounts; matching fills min(taker, maker).
    pub fn min(self, rhs: Quantity) -> Quantity {
        if rhs.0 < self.0 {
            rhs
        } else {
            self
        }
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

// String-backed serde and display, shared by both newtypes. The accept
// predicate is the only difference: a deserialized quantity may be zero,
// a price may not.
macro_rules! decimal_string_repr {
    ($name:ident, $accept:expr, $reject_msg:literal) => {
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                let value = Decimal::from_str(&text).map_err(serde::de::Error::custom)?;
                let accept: fn(Decimal) -> bool = $accept;
                if accept(value) {
                    Ok($name(value))
                } else {
                    Err(serde::de::Error::custom($reject_msg))
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

decimal_string_repr!(Price, |v| v > Decimal::ZERO, "price must be positive");
decimal_string_repr!(Quantity, |v| v >= Decimal::ZERO, "quantity must not be negative");

/// Quote value of `base × price`, rounded half-away-from-zero at `scale`
/// decimal places.
///
/// Rounding a midpoint away from zero moves the result by at most half an
/// ulp at the given scale, so the rounded quote never exceeds the exact
/// product rounded up.
pub fn quote_value(base: Quantity, price: Price, scale: u32) -> Decimal {
    (base.0 * price.0).round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_refuses_zero_and_negative() {
        assert!(Price::try_new(Decimal::ZERO).is_none());
        assert!(Price::try_new(dec!(-1)).is_none());
        assert!(Price::try_new(dec!(0.00000001)).is_some());
    }

    #[test]
    #[should_panic(expected = "literal price must be positive")]
    fn price_literal_zero_panics() {
        Price::from_u64(0);
    }

    #[test]
    fn price_ordering_follows_decimal() {
        let low = Price::from_str("99.5").unwrap();
        let high = Price::from_str("100").unwrap();
        assert!(low < high);
        assert_eq!(low.max(high), high);
    }

    #[test]
    fn price_roundtrips_as_json_string() {
        let price = Price::from_str("61234.125").unwrap();
        let encoded = serde_json::to_string(&price).unwrap();
        assert_eq!(encoded, "\"61234.125\"");
        assert_eq!(serde_json::from_str::<Price>(&encoded).unwrap(), price);
    }

    #[test]
    fn negative_price_fails_deserialization() {
        assert!(serde_json::from_str::<Price>("\"-5\"").is_err());
        assert!(serde_json::from_str::<Price>("\"0\"").is_err());
    }

    #[test]
    fn quantity_zero_roundtrips_but_positive_parse_refuses_it() {
        // Zero arrives via fills, so serde accepts it
        let zero: Quantity = serde_json::from_str("\"0\"").unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, Quantity::zero());
        // Negative never passes
        assert!(serde_json::from_str::<Quantity>("\"-0.1\"").is_err());
    }

    #[test]
    fn quantity_add_and_checked_sub() {
        let a = Quantity::from_str("2.5").unwrap();
        let b = Quantity::from_str("1.5").unwrap();

        assert_eq!(a + b, Quantity::from_str("4.0").unwrap());
        assert_eq!(a.checked_sub(b), Some(Quantity::from_str("1.0").unwrap()));
        assert_eq!(a.checked_sub(a), Some(Quantity::zero()));
        assert_eq!(b.checked_sub(a), None, "underflow must be reported");
    }

    #[test]
    fn quantity_min_picks_smaller_fill() {
        let taker = Quantity::from_str("0.7").unwrap();
        let maker = Quantity::from_str("0.5").unwrap();
        assert_eq!(taker.min(maker), maker);
        assert_eq!(maker.min(taker), maker);
        assert_eq!(maker.min(maker), maker);
    }

    #[test]
    fn quote_value_rounds_midpoint_away_from_zero() {
        // 0.333 × 100.5 = 33.4665; the midpoint digit rounds up at scale 2
        let base = Quantity::from_str("0.333").unwrap();
        let price = Price::from_str("100.5").unwrap();
        assert_eq!(quote_value(base, price, 2), dec!(33.47));
        // A scale wide enough to hold the exact product leaves it alone
        assert_eq!(quote_value(base, price, 8), dec!(33.4665));
    }

    #[test]
    fn quote_value_is_deterministic() {
        let base = Quantity::from_str("0.123456789").unwrap();
        let price = Price::from_str("50000.987654321").unwrap();
        let first = quote_value(base, price, 8);
        let second = quote_value(base, price, 8);
        assert_eq!(first, second);
    }
}
