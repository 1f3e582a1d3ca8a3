//! EC2 backend implementation.
//!
//! This module provides the `Ec2Backend` which talks to the EC2 API through
//! one long-lived SDK client, created at process start and shared by every
//! invocation.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::config::retry::RetryConfig;
use aws_sdk_ec2::config::timeout::TimeoutConfig;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::operation::describe_instances::DescribeInstancesOutput;
use aws_sdk_ec2::types as ec2;
use aws_sdk_ec2::Client;
use tracing::{debug, info, warn};

use stopstart_core::{InstanceId, InstanceState};

use crate::backend::ComputeBackend;
use crate::types::{BackendConfig, InstanceQuery, InstanceSummary, Reservation, StateChange};
use crate::{BackendError, Result};

const DESCRIBE_INSTANCES: &str = "DescribeInstances";
const START_INSTANCES: &str = "StartInstances";
const STOP_INSTANCES: &str = "StopInstances";

/// Filter name for the instance lifecycle state.
const STATE_FILTER: &str = "instance-state-name";

/// Error code EC2 answers with when a dry-run request would have succeeded.
const DRY_RUN_OK: &str = "DryRunOperation";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// EC2-backed compute backend.
#[derive(Debug, Clone)]
pub struct Ec2Backend {
    client: Client,
    dry_run: bool,
}

impl Ec2Backend {
    /// Create a new EC2 backend.
    ///
    /// Credentials and region come from the SDK default provider chain
    /// unless overridden in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if no region can be resolved.
    pub async fn new(config: BackendConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        if sdk_config.region().is_none() {
            return Err(BackendError::Config(
                "no AWS region configured (set AWS_REGION or STOPSTART_REGION)".to_string(),
            ));
        }

        let mut builder = aws_sdk_ec2::config::Builder::from(&sdk_config).retry_config(
            RetryConfig::standard().with_max_attempts(config.effective_max_attempts()),
        );
        if let Some(url) = &config.endpoint_url {
            builder = builder.endpoint_url(url);
        }
        if let Some(timeout) = config.call_timeout() {
            builder = builder.timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(CONNECT_TIMEOUT)
                    .operation_timeout(timeout)
                    .build(),
            );
        }

        info!(
            region = ?sdk_config.region(),
            endpoint = ?config.endpoint_url,
            dry_run = config.dry_run,
            max_attempts = config.effective_max_attempts(),
            "Created EC2 client"
        );

        Ok(Self::with_client(
            Client::from_conf(builder.build()),
            config.dry_run,
        ))
    }

    /// Create a backend around a pre-configured client.
    #[must_use]
    pub fn with_client(client: Client, dry_run: bool) -> Self {
        Self { client, dry_run }
    }

    fn id_strings(instance_ids: &[InstanceId]) -> Vec<String> {
        instance_ids.iter().map(|id| id.as_str().to_string()).collect()
    }
}

#[async_trait]
impl ComputeBackend for Ec2Backend {
    async fn describe_instances(&self, query: &InstanceQuery) -> Result<Vec<Reservation>> {
        let tag_filter = ec2::Filter::builder()
            .name(query.tag.filter_name())
            .values(query.tag.value())
            .build();
        let state_filter = ec2::Filter::builder()
            .name(STATE_FILTER)
            .values(query.state.as_ec2_name())
            .build();

        let pages = self
            .client
            .describe_instances()
            .filters(tag_filter)
            .filters(state_filter)
            .into_paginator()
            .send()
            .try_collect()
            .await
            .map_err(|e| map_sdk_error(DESCRIBE_INSTANCES, &e))?;

        debug!(
            tag = %query.tag,
            state = %query.state,
            pages = pages.len(),
            "Described instances"
        );

        convert_reservations(&pages)
    }

    async fn start_instances(&self, instance_ids: &[InstanceId]) -> Result<Vec<StateChange>> {
        let result = self
            .client
            .start_instances()
            .set_instance_ids(Some(Self::id_strings(instance_ids)))
            .dry_run(self.dry_run)
            .send()
            .await;

        match result {
            Ok(output) => Ok(convert_state_changes(output.starting_instances())),
            Err(e) if is_dry_run_success(&e) => {
                info!(count = instance_ids.len(), "Dry run: StartInstances would have succeeded");
                Ok(Vec::new())
            }
            Err(e) => Err(map_sdk_error(START_INSTANCES, &e)),
        }
    }

    async fn stop_instances(&self, instance_ids: &[InstanceId]) -> Result<Vec<StateChange>> {
        let result = self
            .client
            .stop_instances()
            .set_instance_ids(Some(Self::id_strings(instance_ids)))
            .dry_run(self.dry_run)
            .send()
            .await;

        match result {
            Ok(output) => Ok(convert_state_changes(output.stopping_instances())),
            Err(e) if is_dry_run_success(&e) => {
                info!(count = instance_ids.len(), "Dry run: StopInstances would have succeeded");
                Ok(Vec::new())
            }
            Err(e) => Err(map_sdk_error(STOP_INSTANCES, &e)),
        }
    }
}

fn state_of(state: Option<&ec2::InstanceState>) -> InstanceState {
    state
        .and_then(ec2::InstanceState::name)
        .map_or(InstanceState::Unknown, |name| {
            InstanceState::from_ec2_name(name.as_str())
        })
}

/// Convert every page of a `DescribeInstances` response into reservations.
///
/// An instance without an id cannot be acted upon, so the whole response is
/// rejected rather than silently shrinking the inventory.
fn convert_reservations(pages: &[DescribeInstancesOutput]) -> Result<Vec<Reservation>> {
    let mut reservations = Vec::new();

    for page in pages {
        for reservation in page.reservations() {
            let mut instances = Vec::with_capacity(reservation.instances().len());

            for instance in reservation.instances() {
                let raw_id = instance.instance_id().ok_or_else(|| {
                    BackendError::MalformedResponse {
                        operation: DESCRIBE_INSTANCES,
                        message: format!(
                            "instance without InstanceId in reservation {}",
                            reservation.reservation_id().unwrap_or("<unknown>")
                        ),
                    }
                })?;
                let instance_id =
                    InstanceId::new(raw_id).map_err(|e| BackendError::MalformedResponse {
                        operation: DESCRIBE_INSTANCES,
                        message: format!("invalid InstanceId {raw_id:?}: {e}"),
                    })?;

                instances.push(InstanceSummary {
                    instance_id,
                    state: state_of(instance.state()),
                });
            }

            reservations.push(Reservation {
                reservation_id: reservation.reservation_id().map(str::to_string),
                instances,
            });
        }
    }

    Ok(reservations)
}

/// Convert the acknowledgements of a start/stop request.
///
/// The request already succeeded at this point, so unreadable entries are
/// logged and skipped instead of failing the batch.
fn convert_state_changes(changes: &[ec2::InstanceStateChange]) -> Vec<StateChange> {
    changes
        .iter()
        .filter_map(|change| {
            let Some(raw_id) = change.instance_id() else {
                warn!("State change without InstanceId in response");
                return None;
            };
            match InstanceId::new(raw_id) {
                Ok(instance_id) => Some(StateChange {
                    instance_id,
                    previous: state_of(change.previous_state()),
                    current: state_of(change.current_state()),
                }),
                Err(e) => {
                    warn!(raw_id, error = %e, "Invalid InstanceId in state change");
                    None
                }
            }
        })
        .collect()
}

fn is_dry_run_success<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    err.as_service_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == DRY_RUN_OK)
}

/// Classify a modeled service error by its EC2 error code.
fn classify_service_error<E>(operation: &'static str, err: &E) -> BackendError
where
    E: ProvideErrorMetadata,
{
    BackendError::from_code(
        operation,
        err.code().unwrap_or("Unknown"),
        err.message().unwrap_or("no error message"),
    )
}

fn map_sdk_error<E, R>(operation: &'static str, err: &SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::ServiceError(service) => classify_service_error(operation, service.err()),
        SdkError::TimeoutError(_) => BackendError::Timeout { operation },
        SdkError::DispatchFailure(_) => BackendError::Transport {
            operation,
            message: DisplayErrorContext(err).to_string(),
        },
        SdkError::ResponseError(_) => BackendError::MalformedResponse {
            operation,
            message: DisplayErrorContext(err).to_string(),
        },
        _ => BackendError::Api {
            operation,
            code: "Unknown".to_string(),
            message: DisplayErrorContext(err).to_string(),
        },
    }
}
