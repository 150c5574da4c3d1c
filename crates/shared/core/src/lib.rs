//! Argus Core Domain
//!
//! Pure domain types for the Argus market-forensics engine.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod error;
pub mod stats;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{BookLevel, BookSnapshot, FeedEvent, Side, TradeTick};
pub use error::ValidationError;
pub use stats::{RingBuffer, RollingWindow};
pub use values::{InstrumentId, PriceKey, TimestampMs};
