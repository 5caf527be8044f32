//! [`VersionStore`] over the AWS SDK for Rust.
//!
//! Every SDK failure is turned into a [`StoreError`] here, so the engine
//! never sees SDK types. Service errors keep their S3 error code; anything
//! without a code (network, timeout, dispatch) becomes a transport error.
//! Lock-query codes listed in the configuration are collapsed into
//! [`LockQueryResult::NotConfigured`] at this boundary.

use std::fmt;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::DateTime as SmithyDateTime;
use aws_sdk_s3::types::{Delete, ObjectIdentifier, ObjectLockLegalHoldStatus};
use chrono::{DateTime, Utc};
use tracing::debug;

use bucketsweep_core::store::{
    DeleteFailure, DeleteReport, LockQueryResult, PageCursor, StoreError, StoreResult,
    VersionPage, VersionStore,
};
use bucketsweep_core::types::{
    LegalHoldStatus, ObjectVersionRef, PurgeBatch, Retention, RetentionMode,
};

use crate::config::AwsStoreConfig;

/// S3 client wrapper implementing [`VersionStore`].
#[derive(Debug, Clone)]
pub struct AwsVersionStore {
    client: aws_sdk_s3::Client,
    not_configured_codes: Vec<String>,
}

impl AwsVersionStore {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: aws_sdk_s3::Client, not_configured_codes: Vec<String>) -> Self {
        Self {
            client,
            not_configured_codes,
        }
    }

    /// Build a client from the SDK default chain plus `config` overrides.
    pub async fn from_config(config: &AwsStoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts));
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(
            region = ?shared.region(),
            endpoint_url = ?config.endpoint_url,
            force_path_style = config.force_path_style,
            max_attempts = config.max_attempts,
            "created S3 client"
        );

        Self::new(
            aws_sdk_s3::Client::from_conf(builder.build()),
            config.lock_not_configured_codes.clone(),
        )
    }

    /// The wrapped client.
    #[must_use]
    pub fn client(&self) -> &aws_sdk_s3::Client {
        &self.client
    }
}

#[async_trait]
impl VersionStore for AwsVersionStore {
    async fn list_versions(
        &self,
        bucket: &str,
        cursor: Option<&PageCursor>,
    ) -> StoreResult<VersionPage> {
        let output = self
            .client
            .list_object_versions()
            .bucket(bucket)
            .set_key_marker(cursor.map(|c| c.key_marker.clone()))
            .set_version_id_marker(cursor.and_then(|c| c.version_id_marker.clone()))
            .send()
            .await
            .map_err(sdk_error)?;

        let mut versions =
            Vec::with_capacity(output.versions().len() + output.delete_markers().len());
        for v in output.versions() {
            versions.push(ObjectVersionRef::version(
                required(v.key(), "Versions.Key")?,
                v.version_id().unwrap_or("null"),
            ));
        }
        for m in output.delete_markers() {
            versions.push(ObjectVersionRef::delete_marker(
                required(m.key(), "DeleteMarkers.Key")?,
                m.version_id().unwrap_or("null"),
            ));
        }

        let next = next_cursor(
            output.is_truncated().unwrap_or(false),
            output.next_key_marker(),
            output.next_version_id_marker(),
        )?;

        Ok(VersionPage { versions, next })
    }

    async fn get_retention(
        &self,
        bucket: &str,
        version: &ObjectVersionRef,
    ) -> StoreResult<LockQueryResult<Retention>> {
        let result = self
            .client
            .get_object_retention()
            .bucket(bucket)
            .key(&version.key)
            .version_id(&version.version_id)
            .send()
            .await
            .map_err(sdk_error);

        let codes = self.not_configured_codes.as_slice();
        let retention = match LockQueryResult::collapse(result, codes)? {
            LockQueryResult::Found(output) => output.retention().cloned(),
            LockQueryResult::NotConfigured => None,
        };
        let Some(retention) = retention else {
            return Ok(LockQueryResult::NotConfigured);
        };

        let (Some(mode), Some(until)) = (retention.mode(), retention.retain_until_date()) else {
            return Ok(LockQueryResult::NotConfigured);
        };
        let mode: RetentionMode = mode
            .as_str()
            .parse()
            .map_err(|e| StoreError::Malformed(format!("{e}")))?;

        Ok(LockQueryResult::Found(Retention {
            mode,
            retain_until: to_chrono(until)?,
        }))
    }

    async fn get_legal_hold(
        &self,
        bucket: &str,
        version: &ObjectVersionRef,
    ) -> StoreResult<LockQueryResult<LegalHoldStatus>> {
        let result = self
            .client
            .get_object_legal_hold()
            .bucket(bucket)
            .key(&version.key)
            .version_id(&version.version_id)
            .send()
            .await
            .map_err(sdk_error);

        let codes = self.not_configured_codes.as_slice();
        let hold = match LockQueryResult::collapse(result, codes)? {
            LockQueryResult::Found(output) => output,
            LockQueryResult::NotConfigured => return Ok(LockQueryResult::NotConfigured),
        };

        let on = hold.legal_hold().and_then(|h| h.status()) == Some(&ObjectLockLegalHoldStatus::On);
        Ok(LockQueryResult::Found(if on {
            LegalHoldStatus::On
        } else {
            LegalHoldStatus::Off
        }))
    }

    async fn delete_versions(
        &self,
        bucket: &str,
        batch: &PurgeBatch,
    ) -> StoreResult<DeleteReport> {
        let objects = batch
            .entries()
            .iter()
            .map(|v| {
                ObjectIdentifier::builder()
                    .key(&v.key)
                    .version_id(&v.version_id)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Transport(anyhow::Error::new(e)))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| StoreError::Transport(anyhow::Error::new(e)))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(sdk_error)?;

        let failures: Vec<DeleteFailure> = output
            .errors()
            .iter()
            .map(|e| DeleteFailure {
                key: e.key().unwrap_or_default().to_owned(),
                version_id: e.version_id().map(ToOwned::to_owned),
                code: e.code().unwrap_or("Unknown").to_owned(),
                message: e.message().unwrap_or_default().to_owned(),
            })
            .collect();

        Ok(DeleteReport {
            deleted: batch.len().saturating_sub(failures.len()),
            failures,
        })
    }
}

/// Convert an SDK error into a [`StoreError`].
fn sdk_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let code = err.code().map(ToOwned::to_owned);
    let message = err.message().map(ToOwned::to_owned);
    from_parts(code, message, DisplayErrorContext(&err))
}

/// Build a [`StoreError`] from an error code, message, and full context.
fn from_parts(
    code: Option<String>,
    message: Option<String>,
    context: impl fmt::Display,
) -> StoreError {
    match code {
        Some(code) => StoreError::Service {
            message: message.unwrap_or_else(|| context.to_string()),
            code,
        },
        None => StoreError::Transport(anyhow::anyhow!("{context}")),
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> StoreResult<&'a str> {
    value.ok_or_else(|| StoreError::Malformed(format!("listing entry without {field}")))
}

/// Derive the next page cursor from a listing response.
fn next_cursor(
    truncated: bool,
    key_marker: Option<&str>,
    version_id_marker: Option<&str>,
) -> StoreResult<Option<PageCursor>> {
    if !truncated {
        return Ok(None);
    }
    match key_marker {
        Some(key) if !key.is_empty() => Ok(Some(PageCursor {
            key_marker: key.to_owned(),
            version_id_marker: version_id_marker
                .filter(|v| !v.is_empty())
                .map(ToOwned::to_owned),
        })),
        _ => Err(StoreError::Malformed(
            "truncated listing without NextKeyMarker".to_owned(),
        )),
    }
}

fn to_chrono(value: &SmithyDateTime) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos()).ok_or_else(|| {
        StoreError::Malformed(format!("retain-until date out of range: {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_stop_when_listing_is_not_truncated() {
        let next = next_cursor(false, Some("a"), Some("v1")).expect("cursor");
        assert!(next.is_none());
    }

    #[test]
    fn test_should_build_cursor_from_markers() {
        let next = next_cursor(true, Some("photos/2024.jpg"), Some("3HL4kqtJ"))
            .expect("cursor")
            .expect("truncated");
        assert_eq!(next.key_marker, "photos/2024.jpg");
        assert_eq!(next.version_id_marker.as_deref(), Some("3HL4kqtJ"));

        let next = next_cursor(true, Some("a"), Some(""))
            .expect("cursor")
            .expect("truncated");
        assert!(next.version_id_marker.is_none());
    }

    #[test]
    fn test_should_reject_truncated_listing_without_marker() {
        assert!(matches!(
            next_cursor(true, None, None),
            Err(StoreError::Malformed(_))
        ));
        assert!(matches!(
            next_cursor(true, Some(""), Some("v1")),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_should_keep_service_error_code() {
        let err = from_parts(
            Some("NoSuchObjectLockConfiguration".to_owned()),
            Some("The specified object does not have a ObjectLock configuration".to_owned()),
            "service error",
        );
        assert_eq!(err.code(), Some("NoSuchObjectLockConfiguration"));
        assert!(err.to_string().contains("ObjectLock configuration"));
    }

    #[test]
    fn test_should_fall_back_to_context_message() {
        let err = from_parts(Some("AccessDenied".to_owned()), None, "403 Forbidden");
        assert_eq!(err.to_string(), "AccessDenied: 403 Forbidden");
    }

    #[test]
    fn test_should_map_codeless_errors_to_transport() {
        let err = from_parts(None, None, "dispatch failure: connection refused");
        assert!(matches!(err, StoreError::Transport(_)));
        assert!(err.code().is_none());
    }

    #[test]
    fn test_should_convert_smithy_datetime() {
        let value = SmithyDateTime::from_secs(1_700_000_000);
        let converted = to_chrono(&value).expect("in range");
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_should_require_listing_keys() {
        assert_eq!(required(Some("k"), "Versions.Key").expect("present"), "k");
        assert!(required(None, "Versions.Key").is_err());
    }
}
