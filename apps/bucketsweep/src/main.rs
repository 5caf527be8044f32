//! bucketsweep - empty versioned S3 buckets that may contain Object Lock
//! protected versions.
//!
//! # Usage
//!
//! ```text
//! bucketsweep purge my-bucket            # asks before each destructive pass
//! bucketsweep purge my-bucket --yes      # no prompt
//! bucketsweep inspect my-bucket --json   # read-only summary
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BUCKETSWEEP_BATCH_SIZE` | `1000` | Entries per delete request |
//! | `BUCKETSWEEP_CLASSIFY_CONCURRENCY` | `16` | Lock queries in flight |
//! | `BUCKETSWEEP_DELETE_CONCURRENCY` | `4` | Delete requests in flight |
//! | `BUCKETSWEEP_MAX_PASSES` | `10` | Passes before giving up |
//! | `BUCKETSWEEP_MAX_DURATION_SECS` | *(unset)* | Wall-clock limit |
//! | `BUCKETSWEEP_MAX_ATTEMPTS` | `3` | SDK attempts per request |
//! | `BUCKETSWEEP_LOCK_NOT_CONFIGURED_CODES` | `NoSuchObjectLockConfiguration,InvalidRequest` | Lock-query codes meaning "no lock" |
//! | `DEFAULT_REGION` / `AWS_REGION` | *(SDK chain)* | Region |
//! | `S3_ENDPOINT_URL` | *(unset)* | Custom endpoint |
//! | `S3_FORCE_PATH_STYLE` | `false` | Path-style addressing |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! # Exit Codes
//!
//! `0` when the bucket converged, `2` when the purge was declined, cancelled,
//! or gave up, `1` on error.

mod cli;
mod prompt;
mod report;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bucketsweep_aws::{AwsStoreConfig, AwsVersionStore};
use bucketsweep_core::inventory;
use bucketsweep_core::{AutoConfirm, Confirm, PurgeConfig, PurgeCoordinator};

use crate::cli::{Cli, Command, InspectArgs, PurgeArgs};
use crate::prompt::StdinConfirm;
use crate::report::{InventoryReport, OutcomeReport};

/// Exit code for normal endings that did not converge.
const EXIT_NOT_CONVERGED: u8 = 2;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
/// Logs go to stderr so that stdout carries only the report.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received interrupt, stopping after in-flight deletes");
            token.cancel();
        }
    });
}

async fn purge(
    store: Arc<AwsVersionStore>,
    mut config: PurgeConfig,
    args: PurgeArgs,
) -> Result<ExitCode> {
    args.apply_overrides(&mut config);
    config.validate()?;

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(StdinConfirm::new(cancel.clone()))
    };

    let coordinator = PurgeCoordinator::new(store, config).with_cancellation(cancel);
    let outcome = coordinator
        .purge(&args.bucket, confirm.as_ref())
        .await
        .with_context(|| format!("failed to purge bucket {}", args.bucket))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("failed to serialize outcome")?
        );
    } else {
        println!("{}", OutcomeReport(&outcome));
    }

    info!(
        bucket = %outcome.bucket,
        state = %outcome.state,
        deleted = outcome.deleted_count,
        locked = outcome.locked_count,
        remaining = outcome.remaining_count,
        passes = outcome.passes,
        "purge finished"
    );

    Ok(if outcome.converged {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NOT_CONVERGED)
    })
}

async fn inspect(
    store: Arc<AwsVersionStore>,
    config: PurgeConfig,
    args: InspectArgs,
) -> Result<ExitCode> {
    let inventory = inventory::inspect(store, &args.bucket, &config)
        .await
        .with_context(|| format!("failed to inspect bucket {}", args.bucket))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&inventory).context("failed to serialize inventory")?
        );
    } else {
        println!("{}", InventoryReport(&inventory));
    }
    Ok(ExitCode::SUCCESS)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = PurgeConfig::from_env();
    init_tracing(&config.log_level)?;

    let mut store_config = AwsStoreConfig::from_env();
    cli.apply_store_overrides(&mut store_config);
    let store = Arc::new(AwsVersionStore::from_config(&store_config).await);

    match cli.command {
        Command::Purge(args) => purge(store, config, args).await,
        Command::Inspect(args) => inspect(store, config, args).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}
