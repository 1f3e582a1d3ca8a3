//! Error types for the controller.
//!
//! None of these escape [`Controller::handle`](crate::Controller::handle):
//! the invocation boundary turns them into an
//! [`InvocationResult`](crate::InvocationResult).

use std::time::Duration;

use stopstart_compute::BackendError;
use stopstart_core::{CoreError, Operation};
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in controller operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The compute backend failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The invocation did not finish within its deadline.
    #[error("invocation exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// The deadline expired while the bulk transition was in flight. The
    /// backend may or may not have accepted it.
    #[error(
        "invocation exceeded its deadline of {deadline:?} while submitting {operation} \
         for {count} instance(s); dispatch outcome unknown"
    )]
    DispatchDeadlineExceeded {
        /// The operation being submitted.
        operation: Operation,
        /// Number of instances in the batch.
        count: usize,
        /// The configured deadline.
        deadline: Duration,
    },

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid domain value.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ControlError {
    /// Returns true if re-invoking later might succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_retriable(),
            Self::DeadlineExceeded(_) | Self::DispatchDeadlineExceeded { .. } => true,
            Self::Config(_) | Self::Core(_) => false,
        }
    }
}
