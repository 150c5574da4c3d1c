//! Argus Signal Layer
//!
//! Turns detector output into something a trader can act on:
//! - Market context (swing levels, delta speed) from the tape
//! - Strategy decoder: book walls → candidate setups
//! - Signal fusion: one bounded conviction score and a market mode
//!
//! ## Architecture
//!
//! ```text
//!   BookAnalysis ──────────────► StrategyDecoder ──► Vec<TradeSetup>
//!        │
//!        │ imbalance
//!        ▼
//!   toxicity, forensic ratio ──► FusionEngine ─────► ForensicVerdict
//!        ▲
//!        │ swing level, delta speed
//!   MarketContext ◄── trades
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use argus_strategy::{FusionEngine, FusionInputs};
//!
//! let verdict = FusionEngine::default().evaluate(&FusionInputs {
//!     toxicity: 0.7,
//!     forensic_ratio: 1.8,
//!     order_book_imbalance: 0.3,
//!     ..Default::default()
//! });
//! ```

pub mod context;
pub mod decoder;
pub mod fusion;

// Re-export main types
pub use context::{ContextConfig, MarketContext, SwingLevels};
pub use decoder::{DecoderConfig, Direction, EntryZone, StrategyDecoder, TradeSetup};
pub use fusion::{
    ForensicVerdict, FusionConfig, FusionEngine, FusionInputs, MarketMode, RecommendedAction,
};
