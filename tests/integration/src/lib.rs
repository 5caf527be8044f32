//! Live-endpoint tests for the purge engine and the S3 adapter.
//!
//! Every test creates its own `bsweep-*` bucket, fills it through the raw
//! SDK client, runs bucketsweep against it through [`AwsVersionStore`], and
//! checks the result by listing versions directly. The endpoint must support
//! versioning and Object Lock; it defaults to `http://localhost:4566` and can
//! be moved with `S3_ENDPOINT_URL`.
//!
//! ```text
//! cargo test -p bucketsweep-integration -- --ignored
//! ```

use std::sync::Once;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketVersioningStatus, ObjectIdentifier, ObjectLockLegalHold, ObjectLockLegalHoldStatus,
    VersioningConfiguration,
};
use bucketsweep_aws::{AwsStoreConfig, AwsVersionStore};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_ENDPOINT: &str = "http://localhost:4566";
const TEST_REGION: &str = "us-east-1";

/// Upper bound on cleanup sweeps; compliance-locked versions never go away.
const CLEANUP_SWEEPS: usize = 20;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,bucketsweep_core=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// SDK client with static test credentials and path-style addressing.
#[must_use]
pub fn s3_client() -> aws_sdk_s3::Client {
    init_tracing();

    let endpoint =
        std::env::var("S3_ENDPOINT_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_owned());
    debug!(endpoint = %endpoint, "connecting test client");

    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(TEST_REGION))
        .credentials_provider(Credentials::new(
            "test",
            "test",
            None,
            None,
            "bucketsweep-tests",
        ))
        .endpoint_url(endpoint)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(config)
}

/// The store adapter under test, sharing `client`.
#[must_use]
pub fn version_store(client: &aws_sdk_s3::Client) -> AwsVersionStore {
    AwsVersionStore::new(
        client.clone(),
        AwsStoreConfig::default().lock_not_configured_codes,
    )
}

/// `bsweep-<prefix>-<8 hex chars>`, unique per call.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("bsweep-{prefix}-{}", &id[..8])
}

/// Create a versioned bucket and return its name. Caller is responsible for
/// cleanup.
///
/// With `object_lock`, the bucket is created with Object Lock enabled, which
/// also turns on versioning.
pub async fn create_versioned_bucket(
    client: &aws_sdk_s3::Client,
    prefix: &str,
    object_lock: bool,
) -> String {
    let name = test_bucket_name(prefix);
    let mut req = client.create_bucket().bucket(&name);
    if object_lock {
        req = req.object_lock_enabled_for_bucket(true);
    }
    req.send()
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));

    if !object_lock {
        client
            .put_bucket_versioning()
            .bucket(&name)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .unwrap_or_else(|e| panic!("failed to enable versioning on {name}: {e}"));
    }
    debug!(bucket = %name, object_lock, "created versioned test bucket");
    name
}

/// Write a small object and return its version ID.
pub async fn put_version(client: &aws_sdk_s3::Client, bucket: &str, key: &str) -> String {
    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from_static(b"x"))
        .send()
        .await
        .unwrap_or_else(|e| panic!("put {key}: {e}"))
        .version_id()
        .unwrap_or_else(|| panic!("put {key} returned no version id"))
        .to_owned()
}

/// Count versions plus delete markers.
pub async fn count_entries(client: &aws_sdk_s3::Client, bucket: &str) -> usize {
    let mut total = 0;
    let mut key_marker: Option<String> = None;
    let mut version_id_marker: Option<String> = None;
    loop {
        let resp = client
            .list_object_versions()
            .bucket(bucket)
            .set_key_marker(key_marker.take())
            .set_version_id_marker(version_id_marker.take())
            .send()
            .await
            .unwrap_or_else(|e| panic!("list versions of {bucket}: {e}"));
        total += resp.versions().len() + resp.delete_markers().len();
        if resp.is_truncated() != Some(true) {
            return total;
        }
        key_marker = resp.next_key_marker().map(ToOwned::to_owned);
        version_id_marker = resp.next_version_id_marker().map(ToOwned::to_owned);
    }
}

/// Release legal holds, delete every version (bypassing governance
/// retention), then delete the bucket.
pub async fn cleanup_bucket(client: &aws_sdk_s3::Client, bucket: &str) {
    for sweep in 0..CLEANUP_SWEEPS {
        let Ok(resp) = client.list_object_versions().bucket(bucket).send().await else {
            return; // Bucket may not exist.
        };
        debug!(
            bucket,
            sweep,
            versions = resp.versions().len(),
            markers = resp.delete_markers().len(),
            "cleaning up test bucket"
        );

        let mut objects = Vec::new();
        for v in resp.versions() {
            if let (Some(key), Some(vid)) = (v.key(), v.version_id()) {
                let _ = client
                    .put_object_legal_hold()
                    .bucket(bucket)
                    .key(key)
                    .version_id(vid)
                    .legal_hold(
                        ObjectLockLegalHold::builder()
                            .status(ObjectLockLegalHoldStatus::Off)
                            .build(),
                    )
                    .send()
                    .await;
                objects.extend(ObjectIdentifier::builder().key(key).version_id(vid).build());
            }
        }
        for m in resp.delete_markers() {
            if let (Some(key), Some(vid)) = (m.key(), m.version_id()) {
                objects.extend(ObjectIdentifier::builder().key(key).version_id(vid).build());
            }
        }

        if objects.is_empty() {
            break;
        }
        for object in objects {
            let _ = client
                .delete_object()
                .bucket(bucket)
                .key(object.key())
                .set_version_id(object.version_id().map(ToOwned::to_owned))
                .bypass_governance_retention(true)
                .send()
                .await;
        }
        if resp.is_truncated() != Some(true) {
            break;
        }
    }

    if let Err(e) = client.delete_bucket().bucket(bucket).send().await {
        warn!(bucket, error = %e, "test bucket left behind");
    }
}

mod test_inspect;
mod test_purge;
