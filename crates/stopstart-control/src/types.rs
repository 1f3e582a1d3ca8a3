//! Invocation request/result types and controller configuration.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stopstart_compute::BackendConfig;
use stopstart_core::{InvocationId, Operation, TagPredicate};

use crate::error::{ControlError, Result};

/// Status line returned to the trigger for every invocation.
pub const STATUS_MESSAGE: &str = "Function Executed!";

/// A trigger event, decoded loosely.
///
/// Only `operation` is read; any other field is ignored. The value is kept
/// untyped until [`InvocationRequest::operation`] validates it, so a
/// malformed event still produces a result instead of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Requested operation, `"start"` or `"stop"`.
    #[serde(default)]
    pub operation: Option<Value>,
}

impl InvocationRequest {
    /// Create a request carrying the given operation name.
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(Value::String(operation.into())),
        }
    }

    /// Decode an arbitrary event payload. Non-object payloads and `null`
    /// operations read as a missing operation.
    #[must_use]
    pub fn from_value(payload: Value) -> Self {
        let operation = match payload {
            Value::Object(mut map) => map.remove("operation").filter(|v| !v.is_null()),
            _ => None,
        };
        Self { operation }
    }

    /// Validate the operation.
    ///
    /// # Errors
    ///
    /// Returns the reason the operation is not usable.
    pub fn operation(&self) -> std::result::Result<Operation, InvalidOperationReason> {
        match &self.operation {
            None => Err(InvalidOperationReason::Missing),
            Some(Value::String(name)) => name.parse().map_err(|_| {
                InvalidOperationReason::Unrecognized {
                    value: name.clone(),
                }
            }),
            Some(other) => Err(InvalidOperationReason::Unrecognized {
                value: other.to_string(),
            }),
        }
    }
}

/// Why an invocation's operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidOperationReason {
    /// The event carried no `operation` field.
    Missing,
    /// The event carried something other than `"start"` or `"stop"`.
    Unrecognized {
        /// The offending value, as received.
        value: String,
    },
}

impl fmt::Display for InvalidOperationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("no operation detected"),
            Self::Unrecognized { value } => write!(f, "unrecognized operation {value:?}"),
        }
    }
}

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvocationResult {
    /// A transition was submitted for `count` instances.
    Dispatched {
        /// The operation dispatched.
        operation: Operation,
        /// Number of instances submitted.
        count: usize,
    },
    /// No instance was eligible; nothing was dispatched.
    NoOp {
        /// The operation requested.
        operation: Operation,
    },
    /// The event did not carry a usable operation; no backend call was made.
    InvalidOperation {
        /// Why the operation was rejected.
        reason: InvalidOperationReason,
    },
    /// The backend failed or the deadline expired.
    BackendError {
        /// Error detail, as logged.
        detail: String,
        /// Whether a later invocation might succeed.
        retriable: bool,
    },
}

impl InvocationResult {
    /// `Dispatched` and `NoOp` are successful outcomes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Dispatched { .. } | Self::NoOp { .. })
    }

    /// Number of instances submitted, zero unless `Dispatched`.
    #[must_use]
    pub const fn dispatched_count(&self) -> usize {
        match self {
            Self::Dispatched { count, .. } => *count,
            _ => 0,
        }
    }
}

impl fmt::Display for InvocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatched { operation, count } => {
                write!(f, "{operation} dispatched to {count} instance(s)")
            }
            Self::NoOp { operation } => write!(f, "no instances to {operation}"),
            Self::InvalidOperation { reason } => write!(f, "invalid operation: {reason}"),
            Self::BackendError { detail, .. } => write!(f, "backend error: {detail}"),
        }
    }
}

/// What the execution environment receives back.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResponse {
    /// Fixed human-readable status line.
    pub message: &'static str,
    /// Correlation id of the invocation.
    pub invocation_id: InvocationId,
    /// The outcome.
    pub result: InvocationResult,
    /// Whether start/stop calls were sent as dry runs. A `dispatched`
    /// result then means EC2 validated the request without acting on it.
    pub dry_run: bool,
    /// When the invocation finished.
    pub completed_at: DateTime<Utc>,
}

impl InvocationResponse {
    /// Wrap a result with the status line and completion time.
    #[must_use]
    pub fn new(invocation_id: InvocationId, result: InvocationResult, dry_run: bool) -> Self {
        Self {
            message: STATUS_MESSAGE,
            invocation_id,
            result,
            dry_run,
            completed_at: Utc::now(),
        }
    }
}

/// Configuration for the controller.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Tag scoping the managed instances.
    pub tag: TagPredicate,
    /// Upper bound on the wall-clock time of one invocation.
    pub invocation_timeout: Duration,
    /// Backend client settings.
    pub backend: BackendConfig,
}

impl ControlConfig {
    /// Default invocation deadline in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Create a configuration with default deadline and backend settings.
    #[must_use]
    pub fn new(tag: TagPredicate) -> Self {
        Self {
            tag,
            invocation_timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            backend: BackendConfig {
                max_attempts: BackendConfig::DEFAULT_MAX_ATTEMPTS,
                ..BackendConfig::default()
            },
        }
    }

    /// Override the invocation deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `EC2TAG_KEY`: tag key of the managed instances
    /// - `EC2TAG_VALUE`: tag value of the managed instances
    ///
    /// Optional:
    /// - `INVOCATION_TIMEOUT_SECS`: invocation deadline (default 60)
    /// - everything [`BackendConfig::from_env`] reads
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Config` if a required variable is missing or
    /// a value is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ControlConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let key = lookup("EC2TAG_KEY")
            .ok_or_else(|| ControlError::Config("EC2TAG_KEY is not set".to_string()))?;
        let value = lookup("EC2TAG_VALUE")
            .ok_or_else(|| ControlError::Config("EC2TAG_VALUE is not set".to_string()))?;
        let tag = TagPredicate::new(key, value)
            .map_err(|e| ControlError::Config(e.to_string()))?;

        let invocation_timeout = match lookup("INVOCATION_TIMEOUT_SECS") {
            Some(val) => match val.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ControlError::Config(format!(
                        "INVOCATION_TIMEOUT_SECS must be a positive integer, got {val:?}"
                    )))
                }
            },
            None => Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            tag,
            invocation_timeout,
            backend: BackendConfig::from_lookup(lookup),
        })
    }
}
