use serde::{Deserialize, Serialize};

use super::{BookSnapshot, TradeTick};
use crate::error::ValidationError;
use crate::values::TimestampMs;

/// Canonical feed event: everything the analytics core consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedEvent {
    Trade(TradeTick),
    Book(BookSnapshot),
}

impl FeedEvent {
    /// Get the instrument this event relates to
    pub fn instrument(&self) -> &str {
        match self {
            FeedEvent::Trade(tick) => &tick.instrument,
            FeedEvent::Book(book) => &book.instrument,
        }
    }

    pub fn exchange_timestamp_ms(&self) -> TimestampMs {
        match self {
            FeedEvent::Trade(tick) => tick.exchange_timestamp_ms,
            FeedEvent::Book(book) => book.exchange_timestamp_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            FeedEvent::Trade(tick) => tick.validate(),
            FeedEvent::Book(book) => book.validate(),
        }
    }
}

impl From<TradeTick> for FeedEvent {
    fn from(tick: TradeTick) -> Self {
        FeedEvent::Trade(tick)
    }
}

impl From<BookSnapshot> for FeedEvent {
    fn from(book: BookSnapshot) -> Self {
        FeedEvent::Book(book)
    }
}
