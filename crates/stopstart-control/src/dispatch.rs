//! Lifecycle dispatch: one bulk start/stop call per invocation.

use stopstart_compute::{BackendError, ComputeBackend};
use stopstart_core::{InstanceId, Operation};
use tracing::{debug, info};

/// Submit `operation` for every id in `instance_ids` in a single backend
/// request and return how many instances were submitted.
///
/// Success means the backend accepted the request, not that the instances
/// reached their target state. Callers short-circuit empty sets before
/// getting here; an empty slice still returns `Ok(0)` without a call.
///
/// # Errors
///
/// Returns the backend error unchanged. The batch is all-or-nothing from the
/// controller's point of view.
pub async fn dispatch<B>(
    backend: &B,
    operation: Operation,
    instance_ids: &[InstanceId],
) -> Result<usize, BackendError>
where
    B: ComputeBackend + ?Sized,
{
    if instance_ids.is_empty() {
        debug!(operation = %operation, "Nothing to dispatch");
        return Ok(0);
    }

    info!(
        operation = %operation,
        count = instance_ids.len(),
        instance_ids = %join_ids(instance_ids),
        "Dispatching lifecycle transition"
    );

    let changes = match operation {
        Operation::Start => backend.start_instances(instance_ids).await?,
        Operation::Stop => backend.stop_instances(instance_ids).await?,
    };

    for change in &changes {
        debug!(
            instance_id = %change.instance_id,
            previous = %change.previous,
            current = %change.current,
            "Transition acknowledged"
        );
    }

    Ok(instance_ids.len())
}

/// Comma-separated id list for audit log lines.
pub(crate) fn join_ids(instance_ids: &[InstanceId]) -> String {
    instance_ids
        .iter()
        .map(InstanceId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
