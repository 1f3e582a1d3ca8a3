//! Compute-management backend for the stopstart controller.
//!
//! This crate provides the [`ComputeBackend`] trait and the [`Ec2Backend`]
//! implementation. The controller consumes exactly three backend calls:
//!
//! - List instances by tag and lifecycle state (server-side filtering)
//! - Bulk start by identifier list
//! - Bulk stop by identifier list
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    stopstart-control                            │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  dyn ComputeBackend                             │
//! │     ┌──────────────────┐          ┌──────────────────────┐      │
//! │     │   Ec2Backend     │          │  MockBackend         │      │
//! │     │   (aws-sdk-ec2)  │          │  (test-utils)        │      │
//! │     └──────────────────┘          └──────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         EC2 API                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use stopstart_compute::{BackendConfig, ComputeBackend, Ec2Backend, InstanceQuery};
//! use stopstart_core::{InstanceState, TagPredicate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Ec2Backend::new(BackendConfig::from_env()).await?;
//!
//! let tag = TagPredicate::new("stopstart_me", "yes")?;
//! let query = InstanceQuery::new(tag, InstanceState::Running);
//! for reservation in backend.describe_instances(&query).await? {
//!     for instance in reservation.instances {
//!         println!("{} is {}", instance.instance_id, instance.state);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature to get [`MockBackend`], an in-memory
//! inventory that records every call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod ec2;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use backend::ComputeBackend;
pub use ec2::Ec2Backend;
pub use error::{BackendError, Result};
pub use types::{BackendConfig, InstanceQuery, InstanceSummary, Reservation, StateChange};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{BackendCall, MockBackend};
