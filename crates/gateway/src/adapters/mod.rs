//! Feed adapters
//!
//! Adapters turn raw exchange messages into canonical `FeedEvent`s. They
//! are the only place exchange-specific wire formats are known.

pub mod binance;
pub mod feed;

pub use binance::{DepthParser, FeedAdapter, StreamParser, TradeParser};
pub use feed::{FeedSource, MemoryFeed, ReplayFeed};
