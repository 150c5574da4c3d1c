//! Ingestion / dispatch plane
//!
//! A bounded ring buffer of recent packets plus topic-based fan-out.
//! Every subscription owns a bounded tokio queue; the ingester only ever
//! `try_send`s, so a slow subscriber loses packets instead of stalling
//! the producer or its siblings.

pub mod channel;
pub mod config;
pub mod plane;
pub mod telemetry;

pub use channel::{PacketHandler, SubscriptionId, SubscriptionReceiver};
pub use config::{IngestConfig, Subjects};
pub use plane::IngestionPlane;
pub use telemetry::Telemetry;

use argus_core::FeedEvent;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// One ingested payload as seen by subscribers
#[derive(Debug, Clone)]
pub struct Packet {
    pub channel: Arc<str>,
    /// Plane-wide monotonically increasing sequence number
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
    pub event: Arc<FeedEvent>,
}
