use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::values::{InstrumentId, TimestampMs};

/// Analyzed order book level.
///
/// Rebuilt on every snapshot by the order-book analyzer; never mutated
/// after the analysis that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
    /// Running depth from the touch down to (and including) this level
    pub cumulative_quantity: f64,
    pub is_whale: bool,
    pub is_spoof_suspect: bool,
}

impl BookLevel {
    pub fn new(price: f64, quantity: f64, cumulative_quantity: f64) -> Self {
        Self {
            price,
            quantity,
            cumulative_quantity,
            is_whale: false,
            is_spoof_suspect: false,
        }
    }
}

/// Partial order book snapshot as delivered by the feed.
///
/// Levels are `(price, quantity)` pairs ordered best-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub instrument: InstrumentId,
    pub bids: Vec<(f64, f64)>,
    pub asks: Vec<(f64, f64)>,
    pub exchange_timestamp_ms: TimestampMs,
}

impl BookSnapshot {
    pub fn new(
        instrument: impl Into<InstrumentId>,
        bids: Vec<(f64, f64)>,
        asks: Vec<(f64, f64)>,
        exchange_timestamp_ms: TimestampMs,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            bids,
            asks,
            exchange_timestamp_ms,
        }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|(p, _)| *p)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|(p, _)| *p)
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    /// Reject snapshots that must not mutate analyzer state
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.instrument.is_empty() {
            return Err(ValidationError::MissingInstrument);
        }
        if self.bids.is_empty() {
            return Err(ValidationError::EmptySide("bid"));
        }
        if self.asks.is_empty() {
            return Err(ValidationError::EmptySide("ask"));
        }
        for &(price, quantity) in self.bids.iter().chain(self.asks.iter()) {
            if !price.is_finite() || price <= 0.0 {
                return Err(ValidationError::InvalidPrice(price));
            }
            if !quantity.is_finite() || quantity < 0.0 {
                return Err(ValidationError::InvalidQuantity(quantity));
            }
        }
        Ok(())
    }
}
