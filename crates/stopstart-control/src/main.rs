//! Stopstart Lambda - scheduled instance start/stop entry point.
//!
//! Reads the tag predicate and backend settings from the environment once,
//! builds a single EC2 client, then serves events of the form
//! `{"operation": "start" | "stop"}` until the runtime shuts down.

use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use stopstart_compute::Ec2Backend;
use stopstart_control::{
    ControlConfig, Controller, InvocationId, InvocationRequest, InvocationResponse,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn handle_event(
    controller: &Controller<Ec2Backend>,
    event: LambdaEvent<Value>,
) -> InvocationResponse {
    let invocation_id = InvocationId::from_request_id(&event.context.request_id);
    let request = InvocationRequest::from_value(event.payload);
    controller.respond(&invocation_id, &request).await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // The platform timestamps every line already
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stopstart=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .without_time()
                .with_target(false),
        )
        .init();

    let config = ControlConfig::from_env()?;
    tracing::info!(
        tag = %config.tag,
        timeout_secs = config.invocation_timeout.as_secs(),
        dry_run = config.backend.dry_run,
        "Loaded controller configuration"
    );

    let backend = Arc::new(Ec2Backend::new(config.backend.clone()).await?);
    let controller = Controller::new(backend, config);
    let controller = &controller;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        Ok::<_, Error>(handle_event(controller, event).await)
    }))
    .await
}
