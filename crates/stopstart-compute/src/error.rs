//! Error types for the compute backend crate.

use thiserror::Error;

/// Errors returned by the compute-management backend.
///
/// Every variant carries the backend operation that failed
/// (`DescribeInstances`, `StartInstances`, `StopInstances`) so the log line
/// produced at the invocation boundary is self-contained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend rejected the call because of rate limiting.
    #[error("{operation} throttled: {message}")]
    Throttled {
        /// Backend operation name.
        operation: &'static str,
        /// Error detail from the backend.
        message: String,
    },

    /// Credentials were missing, invalid, or lacked permission.
    #[error("{operation} unauthorized ({code}): {message}")]
    Unauthorized {
        /// Backend operation name.
        operation: &'static str,
        /// Backend error code.
        code: String,
        /// Error detail from the backend.
        message: String,
    },

    /// The call did not complete within the configured timeout.
    #[error("{operation} timed out")]
    Timeout {
        /// Backend operation name.
        operation: &'static str,
    },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("{operation} transport failure: {message}")]
    Transport {
        /// Backend operation name.
        operation: &'static str,
        /// Error detail.
        message: String,
    },

    /// Any other error the backend answered with.
    #[error("{operation} failed ({code}): {message}")]
    Api {
        /// Backend operation name.
        operation: &'static str,
        /// Backend error code, `"Unknown"` if none was supplied.
        code: String,
        /// Error detail from the backend.
        message: String,
    },

    /// The backend answered but the response could not be interpreted.
    #[error("{operation} returned a malformed response: {message}")]
    MalformedResponse {
        /// Backend operation name.
        operation: &'static str,
        /// What was wrong with the response.
        message: String,
    },

    /// Client construction or configuration failure.
    #[error("backend configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Check if this error is likely transient.
    ///
    /// The controller never retries on its own; this only informs the
    /// operator (and the trigger's re-invocation policy) through the logs.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Throttled { .. } | Self::Timeout { .. } | Self::Transport { .. }
        )
    }

    /// Classify a backend error code into the matching variant.
    #[must_use]
    pub fn from_code(operation: &'static str, code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "RequestLimitExceeded" | "Throttling" | "ThrottlingException" => {
                Self::Throttled { operation, message }
            }
            "UnauthorizedOperation"
            | "AuthFailure"
            | "InvalidClientTokenId"
            | "SignatureDoesNotMatch"
            | "ExpiredToken"
            | "AccessDenied"
            | "AccessDeniedException" => Self::Unauthorized {
                operation,
                code: code.to_string(),
                message,
            },
            _ => Self::Api {
                operation,
                code: code.to_string(),
                message,
            },
        }
    }
}

/// A specialized Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
