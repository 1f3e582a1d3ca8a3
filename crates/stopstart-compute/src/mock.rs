//! A mock backend for testing without an EC2 account.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stopstart_core::{InstanceId, InstanceState, Operation};

use crate::backend::ComputeBackend;
use crate::types::{InstanceQuery, InstanceSummary, Reservation, StateChange};
use crate::{BackendError, Result};

/// A backend call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `describe_instances` with the given query.
    Describe(InstanceQuery),
    /// `start_instances` with the given ids.
    Start(Vec<InstanceId>),
    /// `stop_instances` with the given ids.
    Stop(Vec<InstanceId>),
}

impl BackendCall {
    /// Whether this call mutates instance state.
    #[must_use]
    pub const fn is_dispatch(&self) -> bool {
        matches!(self, Self::Start(_) | Self::Stop(_))
    }
}

struct MockInstance {
    instance_id: InstanceId,
    reservation_id: String,
    tags: HashMap<String, String>,
    state: InstanceState,
}

#[derive(Default)]
struct Failures {
    describe: Option<BackendError>,
    dispatch: Option<BackendError>,
}

/// A mock backend that keeps instances in memory.
///
/// Transitions settle instantly by default: a stopped instance reads as
/// `stopped` on the very next query.
pub struct MockBackend {
    instances: Mutex<Vec<MockInstance>>,
    calls: Mutex<Vec<BackendCall>>,
    failures: Mutex<Failures>,
    latency: Mutex<Option<Duration>>,
    settle_instantly: bool,
    ignore_state_filter: bool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            instances: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Failures::default()),
            latency: Mutex::new(None),
            settle_instantly: true,
            ignore_state_filter: false,
        }
    }
}

impl MockBackend {
    /// Create a new, empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave dispatched instances in their transitional state
    /// (`pending` / `stopping`) instead of settling them.
    #[must_use]
    pub fn without_settling(mut self) -> Self {
        self.settle_instantly = false;
        self
    }

    /// Ignore the state clause of inventory queries, emulating a backend
    /// that filters on tags only.
    #[must_use]
    pub fn ignoring_state_filter(mut self) -> Self {
        self.ignore_state_filter = true;
        self
    }

    /// Add an instance in its own reservation.
    ///
    /// # Panics
    ///
    /// Panics if `instance_id` is not a valid instance id.
    pub fn add_instance(&self, instance_id: &str, state: InstanceState, tags: &[(&str, &str)]) {
        let reservation_id = format!("r-{instance_id}");
        self.add_instance_in(&reservation_id, instance_id, state, tags);
    }

    /// Add an instance to the given reservation.
    ///
    /// # Panics
    ///
    /// Panics if `instance_id` is not a valid instance id.
    pub fn add_instance_in(
        &self,
        reservation_id: &str,
        instance_id: &str,
        state: InstanceState,
        tags: &[(&str, &str)],
    ) {
        let instance_id = InstanceId::new(instance_id).expect("valid mock instance id");
        self.instances.lock().push(MockInstance {
            instance_id,
            reservation_id: reservation_id.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            state,
        });
    }

    /// Get the current state of an instance.
    #[must_use]
    pub fn state_of(&self, instance_id: &str) -> Option<InstanceState> {
        self.instances
            .lock()
            .iter()
            .find(|i| i.instance_id.as_str() == instance_id)
            .map(|i| i.state)
    }

    /// Fail the next `describe_instances` call with `error`.
    pub fn fail_next_describe(&self, error: BackendError) {
        self.failures.lock().describe = Some(error);
    }

    /// Fail the next start/stop call with `error`.
    pub fn fail_next_dispatch(&self, error: BackendError) {
        self.failures.lock().dispatch = Some(error);
    }

    /// Delay every call by `latency` (uses tokio time, so paused clocks work).
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// All calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Number of start/stop calls made so far.
    #[must_use]
    pub fn dispatch_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| c.is_dispatch()).count()
    }

    /// Number of `describe_instances` calls made so far.
    #[must_use]
    pub fn describe_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::Describe(_)))
            .count()
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn transition(
        &self,
        operation: Operation,
        instance_ids: &[InstanceId],
    ) -> Result<Vec<StateChange>> {
        let backend_op = match operation {
            Operation::Start => "StartInstances",
            Operation::Stop => "StopInstances",
        };
        let mut instances = self.instances.lock();

        // Unknown ids fail the whole request, like EC2's InvalidInstanceID.NotFound
        if let Some(missing) = instance_ids
            .iter()
            .find(|id| !instances.iter().any(|i| &i.instance_id == *id))
        {
            return Err(BackendError::Api {
                operation: backend_op,
                code: "InvalidInstanceID.NotFound".to_string(),
                message: format!("The instance ID '{missing}' does not exist"),
            });
        }

        let target = if self.settle_instantly {
            operation.settled_state()
        } else {
            operation.transitional_state()
        };

        let mut changes = Vec::with_capacity(instance_ids.len());
        for instance in instances
            .iter_mut()
            .filter(|i| instance_ids.contains(&i.instance_id))
        {
            let previous = instance.state;
            // Already in (or heading to) the target: the backend treats it as a no-op
            if previous != operation.settled_state() && previous != operation.transitional_state()
            {
                instance.state = target;
            }
            changes.push(StateChange {
                instance_id: instance.instance_id.clone(),
                previous,
                current: instance.state,
            });
        }

        Ok(changes)
    }
}

#[async_trait]
impl ComputeBackend for MockBackend {
    async fn describe_instances(&self, query: &InstanceQuery) -> Result<Vec<Reservation>> {
        self.calls.lock().push(BackendCall::Describe(query.clone()));
        self.simulate_latency().await;

        if let Some(error) = self.failures.lock().describe.take() {
            return Err(error);
        }

        let instances = self.instances.lock();
        let mut grouped: Vec<Reservation> = Vec::new();

        for instance in instances.iter().filter(|i| {
            i.tags.get(query.tag.key()).map(String::as_str) == Some(query.tag.value())
                && (self.ignore_state_filter || i.state == query.state)
        }) {
            let summary = InstanceSummary {
                instance_id: instance.instance_id.clone(),
                state: instance.state,
            };
            match grouped
                .iter_mut()
                .find(|r| r.reservation_id.as_deref() == Some(instance.reservation_id.as_str()))
            {
                Some(reservation) => reservation.instances.push(summary),
                None => grouped.push(Reservation {
                    reservation_id: Some(instance.reservation_id.clone()),
                    instances: vec![summary],
                }),
            }
        }

        Ok(grouped)
    }

    async fn start_instances(&self, instance_ids: &[InstanceId]) -> Result<Vec<StateChange>> {
        self.calls.lock().push(BackendCall::Start(instance_ids.to_vec()));
        self.simulate_latency().await;

        if let Some(error) = self.failures.lock().dispatch.take() {
            return Err(error);
        }
        self.transition(Operation::Start, instance_ids)
    }

    async fn stop_instances(&self, instance_ids: &[InstanceId]) -> Result<Vec<StateChange>> {
        self.calls.lock().push(BackendCall::Stop(instance_ids.to_vec()));
        self.simulate_latency().await;

        if let Some(error) = self.failures.lock().dispatch.take() {
            return Err(error);
        }
        self.transition(Operation::Stop, instance_ids)
    }
}
