//! Argus Gateway
//!
//! Edge of the Argus forensics engine. Provides:
//! - Feed adapters (Binance stream JSON → canonical `FeedEvent`s)
//! - The ingestion plane: a bounded ring buffer plus per-channel fan-out
//! - Live ingestion telemetry
//!
//! ## Architecture
//!
//! ```text
//! Exchange stream / replay file
//!         │
//!    ┌────▼────┐
//!    │  Feed   │  normalize + validate
//!    │ Adapter │
//!    └────┬────┘
//!         │ ingest("md.{instrument}", event)
//!    ┌────▼──────┐
//!    │ Ingestion │  ring buffer (overwrite oldest)
//!    │   Plane   │  bounded queue per subscriber
//!    └────┬──────┘
//!         │
//!    Detectors (one worker per instrument)
//! ```

pub mod adapters;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use adapters::{FeedAdapter, FeedSource, MemoryFeed, ReplayFeed};
pub use error::{FeedError, GatewayError, HandlerError, TransportError};
pub use transport::{
    IngestConfig, IngestionPlane, Packet, PacketHandler, Subjects, SubscriptionId,
    SubscriptionReceiver, Telemetry,
};
