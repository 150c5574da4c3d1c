//! Validation errors for malformed feed input

use thiserror::Error;

/// Reason a tick or snapshot was rejected before touching analyzer state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("non-finite or non-positive price: {0}")]
    InvalidPrice(f64),

    #[error("non-finite or negative quantity: {0}")]
    InvalidQuantity(f64),

    #[error("empty {0} side")]
    EmptySide(&'static str),

    #[error("missing instrument id")]
    MissingInstrument,
}
