//! Purge engine configuration.
//!
//! Provides [`PurgeConfig`]. Values are loaded from environment variables and
//! can be overridden programmatically through the typed builder or by the
//! CLI.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{PurgeError, PurgeResult};
use crate::types::MAX_BATCH_SIZE;

/// Purge engine configuration.
///
/// # Examples
///
/// ```
/// use bucketsweep_core::config::PurgeConfig;
///
/// let config = PurgeConfig::builder().max_passes(3).build();
/// assert_eq!(config.batch_size, 1000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct PurgeConfig {
    /// Entries per delete request (at most 1000).
    #[builder(default = MAX_BATCH_SIZE)]
    pub batch_size: usize,

    /// Lock queries kept in flight at once while scanning.
    #[builder(default = 16)]
    pub classify_concurrency: usize,

    /// Delete requests kept in flight at once.
    #[builder(default = 4)]
    pub delete_concurrency: usize,

    /// Passes (scan, delete, re-scan) attempted before giving up.
    #[builder(default = 10)]
    pub max_passes: u32,

    /// Wall-clock limit for the whole purge, checked between passes.
    #[builder(default, setter(strip_option))]
    pub max_duration_secs: Option<u64>,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            classify_concurrency: 16,
            delete_concurrency: 4,
            max_passes: 10,
            max_duration_secs: None,
            log_level: String::from("info"),
        }
    }
}

impl PurgeConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BUCKETSWEEP_BATCH_SIZE` | `1000` |
    /// | `BUCKETSWEEP_CLASSIFY_CONCURRENCY` | `16` |
    /// | `BUCKETSWEEP_DELETE_CONCURRENCY` | `4` |
    /// | `BUCKETSWEEP_MAX_PASSES` | `10` |
    /// | `BUCKETSWEEP_MAX_DURATION_SECS` | *(unset)* |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// Unparseable numeric values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_parse("BUCKETSWEEP_BATCH_SIZE") {
            config.batch_size = n;
        }
        if let Some(n) = env_parse("BUCKETSWEEP_CLASSIFY_CONCURRENCY") {
            config.classify_concurrency = n;
        }
        if let Some(n) = env_parse("BUCKETSWEEP_DELETE_CONCURRENCY") {
            config.delete_concurrency = n;
        }
        if let Some(n) = env_parse("BUCKETSWEEP_MAX_PASSES") {
            config.max_passes = n;
        }
        if let Some(n) = env_parse("BUCKETSWEEP_MAX_DURATION_SECS") {
            config.max_duration_secs = Some(n);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// The wall-clock limit, if one is set.
    #[must_use]
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> PurgeResult<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(PurgeError::InvalidConfig(format!(
                "batch size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.classify_concurrency == 0 {
            return Err(PurgeError::InvalidConfig(
                "classify concurrency must be positive".to_owned(),
            ));
        }
        if self.delete_concurrency == 0 {
            return Err(PurgeError::InvalidConfig(
                "delete concurrency must be positive".to_owned(),
            ));
        }
        if self.max_passes == 0 {
            return Err(PurgeError::InvalidConfig(
                "max passes must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Read and parse an environment variable, ignoring missing or bad values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}
