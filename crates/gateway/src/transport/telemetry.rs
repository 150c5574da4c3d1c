//! Live ingestion telemetry

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Point-in-time view of the ingestion plane
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub total_packets: u64,
    /// Packets ingested over the trailing second
    pub packets_per_sec: u64,
    /// Processing duration of the most recent `ingest` call
    pub last_ingest_nanos: u64,
    /// Live subscribers / configured maximum
    pub buffer_pressure: f64,
    pub ring_len: usize,
    /// Ring entries overwritten on overflow
    pub ring_dropped: u64,
    /// Packets dropped because a subscriber queue was full
    pub dispatch_dropped: u64,
    pub handler_failures: u64,
    pub subscriber_count: usize,
}

const BUCKETS: usize = 10;
const BUCKET_MS: u64 = 100;

/// Ten 100ms buckets covering the trailing second.
///
/// Each slot remembers the epoch it was last written in, so stale slots
/// are ignored without a sweep.
#[derive(Debug, Default)]
pub(crate) struct RateWindow {
    counts: [u64; BUCKETS],
    epochs: [u64; BUCKETS],
}

impl RateWindow {
    pub(crate) fn record(&mut self, elapsed: Duration) {
        let epoch = elapsed.as_millis() as u64 / BUCKET_MS;
        let slot = (epoch % BUCKETS as u64) as usize;
        if self.epochs[slot] != epoch {
            self.epochs[slot] = epoch;
            self.counts[slot] = 0;
        }
        self.counts[slot] += 1;
    }

    pub(crate) fn per_second(&self, elapsed: Duration) -> u64 {
        let now = elapsed.as_millis() as u64 / BUCKET_MS;
        let oldest = now.saturating_sub(BUCKETS as u64 - 1);
        self.epochs
            .iter()
            .zip(self.counts.iter())
            .filter(|(epoch, _)| **epoch >= oldest && **epoch <= now)
            .map(|(_, count)| *count)
            .sum()
    }
}
