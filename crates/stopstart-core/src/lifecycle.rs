//! Instance lifecycle vocabulary and the eligibility filter.
//!
//! # Eligibility
//!
//! ```text
//!              stop (requires Running)
//!   ┌─────────┐ ──────────────────────▶ ┌──────────┐      ┌─────────┐
//!   │ Running │                         │ Stopping │ ───▶ │ Stopped │
//!   └─────────┘                         └──────────┘      └─────────┘
//!        ▲                                                     │
//!        │        ┌─────────┐   start (requires Stopped)       │
//!        └─────── │ Pending │ ◀────────────────────────────────┘
//!                 └─────────┘
//! ```
//!
//! Any instance not in the exact required state is never a transition
//! target, so stopping an already stopped instance (or starting one that is
//! mid-transition) cannot happen.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Requested lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Start stopped instances.
    Start,
    /// Stop running instances.
    Stop,
}

impl Operation {
    /// The only state an instance may be in to be a target of this operation.
    #[must_use]
    pub const fn required_state(self) -> InstanceState {
        match self {
            Self::Start => InstanceState::Stopped,
            Self::Stop => InstanceState::Running,
        }
    }

    /// The state the backend reports immediately after accepting the request.
    #[must_use]
    pub const fn transitional_state(self) -> InstanceState {
        match self {
            Self::Start => InstanceState::Pending,
            Self::Stop => InstanceState::Stopping,
        }
    }

    /// The state an instance settles in once the transition completes.
    #[must_use]
    pub const fn settled_state(self) -> InstanceState {
        match self {
            Self::Start => InstanceState::Running,
            Self::Stop => InstanceState::Stopped,
        }
    }

    /// Check whether an instance in `state` may be targeted by this operation.
    #[must_use]
    pub fn is_eligible(self, state: InstanceState) -> bool {
        state == self.required_state()
    }

    /// Lowercase wire name (`"start"` / `"stop"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    /// Parse an operation name. Matching is exact: `"Stop"` is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(CoreError::InvalidOperation(other.to_string())),
        }
    }
}

/// Lifecycle state of a compute instance as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    /// Starting up.
    Pending,
    /// Up and running.
    Running,
    /// Being terminated.
    ShuttingDown,
    /// Gone for good.
    Terminated,
    /// Being stopped.
    Stopping,
    /// Stopped; can be started again.
    Stopped,
    /// State name not recognised.
    #[default]
    Unknown,
}

impl InstanceState {
    /// Parse an EC2 instance state name (`running`, `shutting-down`, ...).
    #[must_use]
    pub fn from_ec2_name(name: &str) -> Self {
        match name {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            _ => Self::Unknown,
        }
    }

    /// EC2 instance state name, as used in `instance-state-name` filters.
    #[must_use]
    pub const fn as_ec2_name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ec2_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_filter() {
        assert_eq!(Operation::Stop.required_state(), InstanceState::Running);
        assert_eq!(Operation::Start.required_state(), InstanceState::Stopped);
    }

    #[test]
    fn stop_only_targets_running() {
        use InstanceState::*;

        assert!(Operation::Stop.is_eligible(Running));
        for state in [Pending, ShuttingDown, Terminated, Stopping, Stopped, Unknown] {
            assert!(!Operation::Stop.is_eligible(state), "{state} must not be stoppable");
        }
    }

    #[test]
    fn start_only_targets_stopped() {
        use InstanceState::*;

        assert!(Operation::Start.is_eligible(Stopped));
        for state in [Pending, Running, ShuttingDown, Terminated, Stopping, Unknown] {
            assert!(!Operation::Start.is_eligible(state), "{state} must not be startable");
        }
    }

    #[test]
    fn transitions_leave_the_eligible_state() {
        for op in [Operation::Start, Operation::Stop] {
            assert!(!op.is_eligible(op.transitional_state()));
            assert!(!op.is_eligible(op.settled_state()));
        }
    }

    #[test]
    fn operation_parse_is_exact() {
        assert_eq!("start".parse::<Operation>().unwrap(), Operation::Start);
        assert_eq!("stop".parse::<Operation>().unwrap(), Operation::Stop);
        assert!("Stop".parse::<Operation>().is_err());
        assert!(" stop".parse::<Operation>().is_err());
        assert!("restart".parse::<Operation>().is_err());
        assert!("".parse::<Operation>().is_err());
    }

    #[test]
    fn instance_state_ec2_names() {
        assert_eq!(InstanceState::from_ec2_name("running"), InstanceState::Running);
        assert_eq!(
            InstanceState::from_ec2_name("shutting-down"),
            InstanceState::ShuttingDown
        );
        assert_eq!(InstanceState::from_ec2_name("bogus"), InstanceState::Unknown);

        for state in [
            InstanceState::Pending,
            InstanceState::Running,
            InstanceState::ShuttingDown,
            InstanceState::Terminated,
            InstanceState::Stopping,
            InstanceState::Stopped,
        ] {
            assert_eq!(InstanceState::from_ec2_name(state.as_ec2_name()), state);
        }
    }

    #[test]
    fn instance_state_serde_uses_ec2_names() {
        let json = serde_json::to_string(&InstanceState::ShuttingDown).unwrap();
        assert_eq!(json, "\"shutting-down\"");
    }
}
