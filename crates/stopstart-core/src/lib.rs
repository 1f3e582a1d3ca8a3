//! Core types for the stopstart instance lifecycle controller.
//!
//! This crate provides the vocabulary shared by every other stopstart crate:
//!
//! - **Identifiers**: [`InstanceId`] for compute instances and [`InvocationId`]
//!   for correlating the log lines of one trigger event
//! - **Tag predicate**: the immutable `(key, value)` pair that scopes which
//!   instances are managed
//! - **Lifecycle**: [`Operation`], [`InstanceState`] and the eligibility filter
//!   mapping one to the other
//! - **Error types**: [`CoreError`]
//!
//! # Example
//!
//! ```
//! use stopstart_core::{InstanceState, Operation, TagPredicate};
//!
//! let tag = TagPredicate::new("stopstart_me", "yes").unwrap();
//! assert_eq!(tag.filter_name(), "tag:stopstart_me");
//!
//! let operation: Operation = "stop".parse().unwrap();
//! assert_eq!(operation.required_state(), InstanceState::Running);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod tag;

pub use error::{CoreError, Result};
pub use ids::{IdError, InstanceId, InvocationId};
pub use lifecycle::{InstanceState, Operation};
pub use tag::TagPredicate;
