//! Ingestion plane configuration and subject naming

use serde::{Deserialize, Serialize};

/// Subjects for logical message routing
///
/// Trades and book snapshots for one instrument share a single subject so
/// that a subscriber sees them in arrival order.
pub struct Subjects;

impl Subjects {
    /// Market data (trades + books) for a specific instrument: `md.BTCUSDT`
    pub fn market_data(instrument: &str) -> String {
        format!("md.{}", instrument)
    }
}

/// Ingestion plane configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Ring buffer capacity (oldest entry overwritten on overflow)
    pub ring_capacity: usize,
    /// Maximum number of live subscriptions across all channels
    pub max_subscribers: usize,
    /// Per-subscription queue depth before packets are dropped for that subscriber
    pub subscriber_queue_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 1000,
            max_subscribers: 64,
            subscriber_queue_capacity: 1024,
        }
    }
}
