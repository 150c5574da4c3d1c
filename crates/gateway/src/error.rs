//! Error types for the gateway crate

use argus_core::ValidationError;
use thiserror::Error;

/// Ingestion plane errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Ingestion plane is stopped")]
    Stopped,

    #[error("Subscriber limit reached ({0})")]
    SubscriberLimit(usize),

    #[error("No async runtime available to run subscriber")]
    NoRuntime,
}

/// Error returned by a subscriber handler.
///
/// Handler failures are contained in the subscriber's task and counted in
/// telemetry; they never reach the ingester or sibling subscribers.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("handler failed: {0}")]
pub struct HandlerError(pub String);

impl From<String> for HandlerError {
    fn from(msg: String) -> Self {
        HandlerError(msg)
    }
}

impl From<&str> for HandlerError {
    fn from(msg: &str) -> Self {
        HandlerError(msg.to_string())
    }
}

/// Feed adapter errors (raw exchange message normalization)
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unsupported stream: {0}")]
    UnsupportedStream(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid number in field {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Rejected by validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Gateway-level errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}
