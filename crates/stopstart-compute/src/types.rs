//! Types for the compute backend crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stopstart_core::{InstanceId, InstanceState, TagPredicate};

/// A server-side inventory filter: instances carrying `tag` and currently in
/// `state`. Both clauses apply conjunctively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceQuery {
    /// Tag the instances must carry.
    pub tag: TagPredicate,
    /// Lifecycle state the instances must currently be in.
    pub state: InstanceState,
}

impl InstanceQuery {
    /// Create a new query.
    #[must_use]
    pub fn new(tag: TagPredicate, state: InstanceState) -> Self {
        Self { tag, state }
    }
}

/// One instance as reported by the inventory query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSummary {
    /// Instance identifier.
    pub instance_id: InstanceId,
    /// State at query time.
    pub state: InstanceState,
}

/// A launch reservation grouping one or more instances.
///
/// EC2 nests instances inside reservations; callers flatten them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier, if the backend supplied one.
    pub reservation_id: Option<String>,
    /// Instances launched in this reservation that matched the query.
    pub instances: Vec<InstanceSummary>,
}

/// A state change acknowledged by the backend for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Instance identifier.
    pub instance_id: InstanceId,
    /// State before the request.
    pub previous: InstanceState,
    /// State right after the request was accepted.
    pub current: InstanceState,
}

/// Configuration for the EC2 backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Region override. `None` defers to the SDK's default provider chain
    /// (`AWS_REGION`, profile, IMDS).
    pub region: Option<String>,
    /// Custom EC2 endpoint, e.g. a LocalStack URL.
    pub endpoint_url: Option<String>,
    /// Send start/stop requests with `DryRun=true`.
    pub dry_run: bool,
    /// SDK attempts per call. `1` disables SDK-level retries.
    pub max_attempts: u32,
    /// Per-call operation timeout in seconds.
    pub call_timeout_secs: Option<u64>,
}

impl BackendConfig {
    /// Default number of attempts per backend call (no retries).
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `STOPSTART_REGION`: region override
    /// - `STOPSTART_EC2_ENDPOINT`: custom EC2 endpoint URL
    /// - `STOPSTART_DRY_RUN`: `true`/`1`/`yes` enables dry-run mode
    /// - `STOPSTART_MAX_ATTEMPTS`: SDK attempts per call
    /// - `STOPSTART_CALL_TIMEOUT_SECS`: per-call operation timeout
    ///
    /// Unparseable values are ignored and the default kept.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            ..Self::default()
        };

        if let Some(val) = lookup("STOPSTART_REGION").filter(|v| !v.is_empty()) {
            config.region = Some(val);
        }
        if let Some(val) = lookup("STOPSTART_EC2_ENDPOINT").filter(|v| !v.is_empty()) {
            config.endpoint_url = Some(val);
        }
        if let Some(val) = lookup("STOPSTART_DRY_RUN") {
            config.dry_run = parse_flag(&val);
        }
        if let Some(val) = lookup("STOPSTART_MAX_ATTEMPTS") {
            if let Ok(n) = val.parse::<u32>() {
                config.max_attempts = n.max(1);
            }
        }
        if let Some(val) = lookup("STOPSTART_CALL_TIMEOUT_SECS") {
            if let Ok(n) = val.parse::<u64>() {
                config.call_timeout_secs = Some(n).filter(|n| *n > 0);
            }
        }

        config
    }

    /// Attempts per call, never less than one.
    #[must_use]
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Per-call operation timeout as a `Duration`.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_disable_retries() {
        let config = BackendConfig::from_lookup(lookup(&[]));
        assert_eq!(config.max_attempts, 1);
        assert!(!config.dry_run);
        assert!(config.region.is_none());
        assert!(config.call_timeout().is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = BackendConfig::from_lookup(lookup(&[
            ("STOPSTART_REGION", "eu-west-1"),
            ("STOPSTART_EC2_ENDPOINT", "http://localhost:4566"),
            ("STOPSTART_DRY_RUN", "TRUE"),
            ("STOPSTART_MAX_ATTEMPTS", "3"),
            ("STOPSTART_CALL_TIMEOUT_SECS", "10"),
        ]));
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert!(config.dry_run);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.call_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn ignores_garbage() {
        let config = BackendConfig::from_lookup(lookup(&[
            ("STOPSTART_MAX_ATTEMPTS", "many"),
            ("STOPSTART_CALL_TIMEOUT_SECS", "0"),
            ("STOPSTART_DRY_RUN", "nah"),
        ]));
        assert_eq!(config.max_attempts, 1);
        assert!(config.call_timeout().is_none());
        assert!(!config.dry_run);
    }

    #[test]
    fn zero_attempts_clamped() {
        let config = BackendConfig::from_lookup(lookup(&[("STOPSTART_MAX_ATTEMPTS", "0")]));
        assert_eq!(config.effective_max_attempts(), 1);
    }
}
