//! Tag-scoped instance start/stop controller.
//!
//! An external scheduler fires an event carrying `"start"` or `"stop"`; the
//! controller finds every instance carrying the configured tag that is in
//! the state required for that operation and submits one bulk transition.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Trigger (scheduled event / CLI)                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ {"operation": "stop"}
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Controller                           │
//! │  ┌─────────────┐   ┌─────────────────┐   ┌──────────────┐   │
//! │  │  Validate   │──▶│ Inventory Query │──▶│   Dispatch   │   │
//! │  │  operation  │   │ (tag + state)   │   │ (one bulk    │   │
//! │  └─────────────┘   └─────────────────┘   │  call)       │   │
//! │                                          └──────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                    ┌──────────────────┐
//!                    │  ComputeBackend  │
//!                    │      (EC2)       │
//!                    └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use stopstart_compute::Ec2Backend;
//! use stopstart_control::{ControlConfig, Controller, InvocationRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControlConfig::from_env()?;
//! let backend = Arc::new(Ec2Backend::new(config.backend.clone()).await?);
//! let controller = Controller::new(backend, config);
//!
//! let result = controller.handle(&InvocationRequest::new("stop")).await;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```
//!
//! # Eligibility
//!
//! - `stop` targets only `running` instances
//! - `start` targets only `stopped` instances
//!
//! Every invocation re-queries live state; nothing is cached, so firing the
//! same operation twice dispatches at most once per instance.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod dispatch;
pub mod error;
pub mod inventory;
pub mod service;
pub mod types;

pub use dispatch::dispatch;
pub use error::{ControlError, Result};
pub use inventory::find_eligible;
pub use service::Controller;
pub use types::{
    ControlConfig, InvalidOperationReason, InvocationRequest, InvocationResponse,
    InvocationResult, STATUS_MESSAGE,
};

// Re-export commonly used types from dependencies for convenience
pub use stopstart_compute::{BackendError, ComputeBackend};
pub use stopstart_core::{InstanceId, InstanceState, InvocationId, Operation, TagPredicate};
