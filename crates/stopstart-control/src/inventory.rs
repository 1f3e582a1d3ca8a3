//! Inventory query: which tagged instances are eligible for an operation.

use std::collections::HashSet;

use stopstart_compute::{BackendError, ComputeBackend, InstanceQuery, Reservation};
use stopstart_core::{InstanceId, Operation, TagPredicate};
use tracing::{debug, warn};

/// Resolve the instances carrying `tag` that are eligible for `operation`.
///
/// Issues a single backend query whose tag and state clauses are applied
/// server-side, then flattens the reservation-grouped response. An empty
/// result is a normal outcome.
///
/// The caller must have validated `operation` already.
///
/// # Errors
///
/// Returns the backend error unchanged; nothing is retried.
pub async fn find_eligible<B>(
    backend: &B,
    tag: &TagPredicate,
    operation: Operation,
) -> Result<Vec<InstanceId>, BackendError>
where
    B: ComputeBackend + ?Sized,
{
    let required = operation.required_state();
    let query = InstanceQuery::new(tag.clone(), required);

    let reservations = backend.describe_instances(&query).await?;
    let eligible = flatten_eligible(reservations, operation);

    debug!(
        operation = %operation,
        tag = %tag,
        required_state = %required,
        count = eligible.len(),
        "Resolved eligible instances"
    );

    Ok(eligible)
}

/// Flatten reservations into the ids of instances eligible for `operation`.
///
/// The backend already filtered on state; anything that still reports a
/// different state is dropped here so it can never be dispatched.
/// Duplicates are collapsed, first occurrence wins.
#[must_use]
pub fn flatten_eligible(reservations: Vec<Reservation>, operation: Operation) -> Vec<InstanceId> {
    let mut seen = HashSet::new();
    let mut eligible = Vec::new();

    for instance in reservations.into_iter().flat_map(|r| r.instances) {
        if !operation.is_eligible(instance.state) {
            warn!(
                instance_id = %instance.instance_id,
                state = %instance.state,
                required_state = %operation.required_state(),
                "Backend returned an instance outside the requested state, skipping"
            );
            continue;
        }
        if seen.insert(instance.instance_id.clone()) {
            eligible.push(instance.instance_id);
        }
    }

    eligible
}
