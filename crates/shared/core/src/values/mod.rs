use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbol identifier for a tradeable instrument
pub type InstrumentId = String;

/// Exchange timestamp in epoch milliseconds
pub type TimestampMs = i64;

/// Exact, hashable key for a floating point price.
///
/// Prices travel through the engine as `f64`, but per-level state
/// (previous book quantities, trade clusters) is keyed by price and
/// `f64` is neither `Hash` nor `Eq`. The key is the decimal
/// representation of the price, normalized so `100.0` and `100` collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PriceKey(Decimal);

impl PriceKey {
    /// Build a key from a price. Returns `None` for non-finite input.
    pub fn from_f64(price: f64) -> Option<Self> {
        if !price.is_finite() {
            return None;
        }
        Decimal::from_f64(price).map(|d| Self(d.normalize()))
    }
}

impl From<Decimal> for PriceKey {
    fn from(value: Decimal) -> Self {
        Self(value.normalize())
    }
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
