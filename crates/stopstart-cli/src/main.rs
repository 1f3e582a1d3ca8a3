//! Stopstart CLI - run or preview a start/stop pass from a terminal.
//!
//! This is the entry point for the `stopstart` binary. It drives the same
//! controller the Lambda runs, against whatever AWS credentials the default
//! provider chain resolves.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use stopstart_compute::{BackendConfig, Ec2Backend};
use stopstart_control::{ControlConfig, Controller, InvocationId, InvocationRequest};
use stopstart_core::{Operation, TagPredicate};

/// Stopstart CLI - start or stop every instance carrying a tag.
#[derive(Parser, Debug)]
#[command(name = "stopstart")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tag key of the managed instances.
    #[arg(long, env = "EC2TAG_KEY")]
    tag_key: String,

    /// Tag value of the managed instances.
    #[arg(long, env = "EC2TAG_VALUE")]
    tag_value: String,

    /// AWS region (defaults to the SDK provider chain).
    #[arg(long)]
    region: Option<String>,

    /// Ask EC2 to validate start/stop calls without performing them.
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Deadline for the whole pass, in seconds.
    #[arg(long, default_value_t = ControlConfig::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one invocation and print the response as JSON.
    Run {
        /// `start` or `stop`. Anything else is reported as an invalid operation.
        operation: String,
    },
    /// List the instances an operation would target, without dispatching.
    List {
        /// `start` or `stop`.
        operation: Operation,
    },
}

impl Args {
    fn control_config(&self) -> anyhow::Result<ControlConfig> {
        let tag = TagPredicate::new(&self.tag_key, &self.tag_value)
            .context("Invalid tag predicate")?;
        if self.timeout_secs == 0 {
            anyhow::bail!("--timeout-secs must be positive");
        }

        let mut backend = BackendConfig::from_env();
        if let Some(region) = &self.region {
            backend.region = Some(region.clone());
        }
        backend.dry_run |= self.dry_run;

        let mut config =
            ControlConfig::new(tag).with_timeout(Duration::from_secs(self.timeout_secs));
        config.backend = backend;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("stopstart=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let config = args.control_config()?;
    let backend = Ec2Backend::new(config.backend.clone())
        .await
        .context("Failed to create EC2 client")?;
    let controller = Controller::new(Arc::new(backend), config);

    match args.command {
        Command::Run { operation } => {
            let response = controller
                .respond(&InvocationId::generate(), &InvocationRequest::new(operation))
                .await;
            println!("{}", serde_json::to_string_pretty(&response)?);

            if response.result.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::List { operation } => {
            let ids = controller
                .preview(operation)
                .await
                .with_context(|| format!("Failed to list instances to {operation}"))?;

            if ids.is_empty() {
                eprintln!("No servers to {operation}");
            }
            for id in ids {
                println!("{id}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
