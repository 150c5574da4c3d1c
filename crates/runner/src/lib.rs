//! Argus Runner
//!
//! Orchestrates the forensics engine:
//!
//! - **Config**: JSON configuration with one section per component
//! - **Pipeline**: every detector for one instrument, driven in arrival order
//! - **Engine**: ingestion plane wiring, one worker per instrument, polled
//!   reports and a live event stream
//! - **Synthetic**: seeded Binance-format feed for demos and tests
//!
//! ## Architecture
//!
//! ```text
//!   FeedSource (replay / synthetic / live)
//!        │ raw JSON
//!        ▼
//!   FeedAdapter ──► IngestionPlane ──► md.BTCUSDT ──► worker ──► InstrumentPipeline
//!                        │        └──► md.ETHUSDT ──► worker ──► InstrumentPipeline
//!                        │                                  │
//!                   telemetry                 reports (DashMap) + events (broadcast)
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod synthetic;

// Re-export main types
pub use config::{ConfigError, ForensicsConfig, load_config, load_config_from_str, load_default_config};
pub use engine::{EngineEvent, FeedSummary, ForensicsEngine};
pub use error::EngineError;
pub use pipeline::{ForensicEvent, InstrumentPipeline, InstrumentReport, PipelineStats};
pub use synthetic::{SyntheticConfig, SyntheticFeed};
