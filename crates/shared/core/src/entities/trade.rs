use serde::{Deserialize, Serialize};

use super::Side;
use crate::error::ValidationError;
use crate::values::{InstrumentId, TimestampMs};

/// A single trade print, normalized by the feed adapter.
///
/// Immutable once created; every trade-based detector reads it by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub instrument: InstrumentId,
    pub price: f64,
    pub quantity: f64,
    /// True when the seller crossed the spread (buyer was the maker)
    pub is_sell_aggressor: bool,
    pub exchange_timestamp_ms: TimestampMs,
}

impl TradeTick {
    pub fn new(
        instrument: impl Into<InstrumentId>,
        price: f64,
        quantity: f64,
        is_sell_aggressor: bool,
        exchange_timestamp_ms: TimestampMs,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            price,
            quantity,
            is_sell_aggressor,
            exchange_timestamp_ms,
        }
    }

    /// Side of the aggressor
    pub fn aggressor(&self) -> Side {
        if self.is_sell_aggressor {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    /// Quantity signed by aggressor (+buy / -sell)
    pub fn signed_quantity(&self) -> f64 {
        self.aggressor().sign() * self.quantity
    }

    /// Reject prints that must not mutate analyzer state
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.instrument.is_empty() {
            return Err(ValidationError::MissingInstrument);
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ValidationError::InvalidPrice(self.price));
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(ValidationError::InvalidQuantity(self.quantity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggressor_side() {
        let sell = TradeTick::new("BTCUSDT", 100.0, 2.0, true, 0);
        assert_eq!(sell.aggressor(), Side::Sell);
        assert_eq!(sell.signed_quantity(), -2.0);

        let buy = TradeTick::new("BTCUSDT", 100.0, 2.0, false, 0);
        assert_eq!(buy.aggressor(), Side::Buy);
        assert_eq!(buy.signed_quantity(), 2.0);
    }

    #[test]
    fn test_validate_rejects_bad_prints() {
        assert!(TradeTick::new("BTCUSDT", 100.0, 1.0, false, 0).validate().is_ok());
        assert!(matches!(
            TradeTick::new("BTCUSDT", f64::NAN, 1.0, false, 0).validate(),
            Err(ValidationError::InvalidPrice(_))
        ));
        assert!(matches!(
            TradeTick::new("BTCUSDT", -1.0, 1.0, false, 0).validate(),
            Err(ValidationError::InvalidPrice(_))
        ));
        assert!(matches!(
            TradeTick::new("BTCUSDT", 100.0, 0.0, false, 0).validate(),
            Err(ValidationError::InvalidQuantity(_))
        ));
        assert!(matches!(
            TradeTick::new("", 100.0, 1.0, false, 0).validate(),
            Err(ValidationError::MissingInstrument)
        ));
    }
}
