//! Common error types for stopstart.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors raised while building domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// The tag predicate violates the backend's tag constraints.
    #[error("invalid tag predicate: {0}")]
    InvalidTag(String),

    /// The operation name is not one of `start` or `stop`.
    #[error("invalid operation: {0:?}")]
    InvalidOperation(String),
}
