//! Command-line arguments.

use clap::{Args, Parser, Subcommand};

use bucketsweep_aws::AwsStoreConfig;
use bucketsweep_core::PurgeConfig;

/// Empty versioned S3 buckets, skipping Object Lock protected versions.
#[derive(Debug, Parser)]
#[command(name = "bucketsweep", version, about)]
pub struct Cli {
    /// AWS region (overrides `DEFAULT_REGION` / `AWS_REGION`)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Custom S3 endpoint URL (overrides `S3_ENDPOINT_URL`)
    #[arg(long, global = true)]
    pub endpoint_url: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long, global = true)]
    pub force_path_style: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Permanently delete every unlocked version and delete marker
    Purge(PurgeArgs),
    /// Summarize versions, delete markers, and locked entries without deleting
    Inspect(InspectArgs),
}

/// Arguments of `bucketsweep purge`.
#[derive(Debug, Args)]
pub struct PurgeArgs {
    /// Bucket to empty
    pub bucket: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Maximum number of passes before giving up
    #[arg(long)]
    pub max_passes: Option<u32>,

    /// Wall-clock limit in seconds, checked between passes
    #[arg(long)]
    pub max_duration_secs: Option<u64>,

    /// Entries per delete request (1-1000)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

/// Arguments of `bucketsweep inspect`.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Bucket to inspect
    pub bucket: String,

    /// Print the inventory as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Apply connection flags on top of environment configuration.
    pub fn apply_store_overrides(&self, config: &mut AwsStoreConfig) {
        if let Some(region) = &self.region {
            config.region = Some(region.clone());
        }
        if let Some(endpoint) = &self.endpoint_url {
            config.endpoint_url = Some(endpoint.clone());
        }
        if self.force_path_style {
            config.force_path_style = true;
        }
    }
}

impl PurgeArgs {
    /// Apply purge flags on top of environment configuration.
    pub fn apply_overrides(&self, config: &mut PurgeConfig) {
        if let Some(n) = self.max_passes {
            config.max_passes = n;
        }
        if let Some(secs) = self.max_duration_secs {
            config.max_duration_secs = Some(secs);
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
    }
}
