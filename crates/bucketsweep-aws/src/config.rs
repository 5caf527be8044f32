//! AWS adapter configuration.
//!
//! Provides [`AwsStoreConfig`]. Credentials are not configured here; they
//! come from the SDK's default provider chain.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use bucketsweep_core::store::DEFAULT_NOT_CONFIGURED_CODES;

/// Settings for building an [`AwsVersionStore`](crate::AwsVersionStore).
///
/// # Examples
///
/// ```
/// use bucketsweep_aws::config::AwsStoreConfig;
///
/// let config = AwsStoreConfig::default();
/// assert_eq!(config.max_attempts, 3);
/// assert!(config.endpoint_url.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AwsStoreConfig {
    /// Region override. `None` lets the SDK resolve the region.
    #[builder(default, setter(strip_option, into))]
    pub region: Option<String>,

    /// Custom endpoint (e.g. a local S3 emulator).
    #[builder(default, setter(strip_option, into))]
    pub endpoint_url: Option<String>,

    /// Whether to use path-style addressing.
    #[builder(default = false)]
    pub force_path_style: bool,

    /// Attempts per request made by the SDK retry layer, first try included.
    #[builder(default = 3)]
    pub max_attempts: u32,

    /// Lock-query error codes that mean "no restriction applies".
    #[builder(default = default_not_configured_codes())]
    pub lock_not_configured_codes: Vec<String>,
}

impl Default for AwsStoreConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            force_path_style: false,
            max_attempts: 3,
            lock_not_configured_codes: default_not_configured_codes(),
        }
    }
}

impl AwsStoreConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DEFAULT_REGION`, then `AWS_REGION` | *(SDK default chain)* |
    /// | `S3_ENDPOINT_URL` | *(unset)* |
    /// | `S3_FORCE_PATH_STYLE` | `false` |
    /// | `BUCKETSWEEP_MAX_ATTEMPTS` | `3` |
    /// | `BUCKETSWEEP_LOCK_NOT_CONFIGURED_CODES` | `NoSuchObjectLockConfiguration,InvalidRequest` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DEFAULT_REGION").or_else(|_| std::env::var("AWS_REGION")) {
            config.region = non_empty(v);
        }
        if let Ok(v) = std::env::var("S3_ENDPOINT_URL") {
            config.endpoint_url = non_empty(v);
        }
        if let Ok(v) = std::env::var("S3_FORCE_PATH_STYLE") {
            config.force_path_style = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("BUCKETSWEEP_MAX_ATTEMPTS") {
            if let Ok(n) = v.trim().parse::<u32>() {
                config.max_attempts = n.max(1);
            }
        }
        if let Ok(v) = std::env::var("BUCKETSWEEP_LOCK_NOT_CONFIGURED_CODES") {
            let codes = parse_code_list(&v);
            if !codes.is_empty() {
                config.lock_not_configured_codes = codes;
            }
        }

        config
    }
}

fn default_not_configured_codes() -> Vec<String> {
    DEFAULT_NOT_CONFIGURED_CODES
        .iter()
        .map(|c| (*c).to_owned())
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Split a comma-separated code list, dropping blanks.
fn parse_code_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
