//! Error types for the runner crate

use crate::config::ConfigError;
use argus_gateway::{FeedError, GatewayError, TransportError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl EngineError {
    /// The raw message was rejected by the feed adapter
    pub fn is_feed_rejection(&self) -> bool {
        matches!(self, EngineError::Gateway(GatewayError::Feed(_)))
    }
}

impl From<TransportError> for EngineError {
    fn from(err: TransportError) -> Self {
        EngineError::Gateway(GatewayError::Transport(err))
    }
}

impl From<FeedError> for EngineError {
    fn from(err: FeedError) -> Self {
        EngineError::Gateway(GatewayError::Feed(err))
    }
}
