//! The compute-management backend interface.

use async_trait::async_trait;
use stopstart_core::InstanceId;

use crate::types::{InstanceQuery, Reservation, StateChange};
use crate::Result;

/// The `ComputeBackend` trait defines the three backend calls the
/// controller consumes.
///
/// Implementations are long-lived and shared by every invocation; they must
/// not cache inventory between calls.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    /// List instances matching both clauses of `query`, grouped by
    /// reservation.
    ///
    /// Filtering happens on the backend side in a single logical request.
    /// No matches is `Ok(vec![])`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport, auth, throttling or response failures.
    async fn describe_instances(&self, query: &InstanceQuery) -> Result<Vec<Reservation>>;

    /// Submit one bulk start request for all `instance_ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected; the whole batch is
    /// considered failed.
    async fn start_instances(&self, instance_ids: &[InstanceId]) -> Result<Vec<StateChange>>;

    /// Submit one bulk stop request for all `instance_ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected; the whole batch is
    /// considered failed.
    async fn stop_instances(&self, instance_ids: &[InstanceId]) -> Result<Vec<StateChange>>;
}
