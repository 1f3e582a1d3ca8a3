//! Controller: the invocation entry point.
//!
//! One invocation is a linear pipeline:
//!
//! ```text
//! event ─▶ validate operation ─▶ find_eligible ─▶ empty? ─▶ NoOp
//!                │                     │             │
//!                ▼                     ▼             ▼
//!        InvalidOperation        BackendError     dispatch ─▶ Dispatched(n)
//!                                                    │
//!                                                    ▼
//!                                               BackendError
//! ```
//!
//! Steps after validation share one deadline. If it expires while the bulk
//! call is in flight, the backend may already have accepted the batch, so
//! that case is reported separately from an expired query. The controller
//! keeps no state between invocations.

use std::sync::Arc;

use stopstart_compute::ComputeBackend;
use stopstart_core::{InstanceId, InvocationId, Operation};
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, info_span, warn, Instrument};

use crate::dispatch::dispatch;
use crate::error::{ControlError, Result};
use crate::inventory::find_eligible;
use crate::types::{
    ControlConfig, InvalidOperationReason, InvocationRequest, InvocationResponse, InvocationResult,
};

/// The lifecycle controller.
///
/// Holds the injected backend client and immutable configuration; safe to
/// share across concurrent invocations.
pub struct Controller<B: ComputeBackend + ?Sized> {
    backend: Arc<B>,
    config: ControlConfig,
}

impl<B: ComputeBackend + ?Sized> Controller<B> {
    /// Create a new controller.
    #[must_use]
    pub fn new(backend: Arc<B>, config: ControlConfig) -> Self {
        Self { backend, config }
    }

    /// Handle one trigger event under a freshly generated invocation id.
    pub async fn handle(&self, request: &InvocationRequest) -> InvocationResult {
        self.handle_with_id(&InvocationId::generate(), request).await
    }

    /// Handle one trigger event and wrap the outcome for the trigger.
    pub async fn respond(
        &self,
        invocation_id: &InvocationId,
        request: &InvocationRequest,
    ) -> InvocationResponse {
        let result = self.handle_with_id(invocation_id, request).await;
        InvocationResponse::new(invocation_id.clone(), result, self.config.backend.dry_run)
    }

    /// Handle one trigger event.
    ///
    /// Never fails: every error is logged and converted into an
    /// [`InvocationResult`].
    pub async fn handle_with_id(
        &self,
        invocation_id: &InvocationId,
        request: &InvocationRequest,
    ) -> InvocationResult {
        let span = info_span!("invocation", invocation_id = %invocation_id);
        self.handle_inner(request).instrument(span).await
    }

    /// List the instances an operation would target, without dispatching.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the deadline expires.
    pub async fn preview(&self, operation: Operation) -> Result<Vec<InstanceId>> {
        self.query_until(self.deadline(), operation).await
    }

    async fn handle_inner(&self, request: &InvocationRequest) -> InvocationResult {
        let operation = match request.operation() {
            Ok(operation) => operation,
            Err(reason) => {
                match &reason {
                    InvalidOperationReason::Missing => warn!("No operation detected"),
                    InvalidOperationReason::Unrecognized { value } => {
                        warn!(value = %value, "Invalid operation");
                    }
                }
                return InvocationResult::InvalidOperation { reason };
            }
        };

        let result = match self.run(operation).await {
            Ok(result) => result,
            Err(e) => {
                error!(
                    operation = %operation,
                    error = %e,
                    retriable = e.is_retriable(),
                    "Invocation failed"
                );
                InvocationResult::BackendError {
                    detail: e.to_string(),
                    retriable: e.is_retriable(),
                }
            }
        };

        info!(result = %result, dry_run = self.config.backend.dry_run, "Invocation finished");
        result
    }

    async fn run(&self, operation: Operation) -> Result<InvocationResult> {
        let deadline = self.deadline();
        let eligible = self.query_until(deadline, operation).await?;

        if eligible.is_empty() {
            info!(operation = %operation, tag = %self.config.tag, "No servers to {operation}");
            return Ok(InvocationResult::NoOp { operation });
        }

        let count = timeout_at(deadline, dispatch(&*self.backend, operation, &eligible))
            .await
            .map_err(|_| ControlError::DispatchDeadlineExceeded {
                operation,
                count: eligible.len(),
                deadline: self.config.invocation_timeout,
            })??;
        Ok(InvocationResult::Dispatched { operation, count })
    }

    async fn query_until(
        &self,
        deadline: Instant,
        operation: Operation,
    ) -> Result<Vec<InstanceId>> {
        let eligible = timeout_at(
            deadline,
            find_eligible(&*self.backend, &self.config.tag, operation),
        )
        .await
        .map_err(|_| ControlError::DeadlineExceeded(self.config.invocation_timeout))??;
        Ok(eligible)
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.config.invocation_timeout
    }
}
