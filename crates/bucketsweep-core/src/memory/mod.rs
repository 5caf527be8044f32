//! In-memory [`VersionStore`] implementation.
//!
//! [`InMemoryVersionStore`] models a set of versioned buckets with the S3
//! behaviors the purge engine depends on:
//!
//! - object versions and delete markers, listed newest first per key
//! - marker-based pagination with a configurable page size
//! - per-version retention and legal hold, only on Object Lock buckets
//! - `NoSuchObjectLockConfiguration` / `InvalidRequest` answers when no lock
//!   configuration applies
//! - delete-time lock enforcement reported as per-item `AccessDenied`
//!
//! # Thread Safety
//!
//! Buckets live in a `DashMap`; each bucket's key store sits behind a
//! `parking_lot::RwLock`. The store can be shared freely as an `Arc`.

mod keystore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::store::{
    DEFAULT_NOT_CONFIGURED_CODES, DeleteFailure, DeleteReport, LockQueryResult, PageCursor,
    StoreError, StoreResult, VersionPage, VersionStore, codes,
};
use crate::types::{LegalHoldStatus, ObjectVersionRef, PurgeBatch, Retention};

use self::keystore::VersionedKeyStore;

/// Default number of entries per listing page, matching S3's `MaxKeys`.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Per-bucket state.
#[derive(Debug, Default)]
struct MemoryBucket {
    object_lock_enabled: bool,
    versions: RwLock<VersionedKeyStore>,
}

/// An in-memory, versioned, Object Lock aware object store.
///
/// # Examples
///
/// ```
/// use bucketsweep_core::memory::InMemoryVersionStore;
///
/// let store = InMemoryVersionStore::new();
/// store.create_bucket("logs", false);
/// store.put_object("logs", "a.txt").unwrap();
/// assert_eq!(store.version_count("logs").unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryVersionStore {
    buckets: DashMap<String, Arc<MemoryBucket>>,
    page_size: usize,
}

impl Default for InMemoryVersionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVersionStore {
    /// Create an empty store with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store that lists at most `page_size` entries per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            page_size: page_size.max(1),
        }
    }

    /// Create a bucket (versioning is always on). Recreating an existing
    /// bucket replaces it.
    pub fn create_bucket(&self, name: &str, object_lock_enabled: bool) {
        let bucket = MemoryBucket {
            object_lock_enabled,
            versions: RwLock::new(VersionedKeyStore::default()),
        };
        self.buckets.insert(name.to_owned(), Arc::new(bucket));
        info!(bucket = %name, object_lock_enabled, "bucket created");
    }

    /// Write a new object version and return its version ID.
    pub fn put_object(&self, bucket: &str, key: &str) -> StoreResult<String> {
        let bucket = self.bucket(bucket)?;
        let version_id = bucket.versions.write().put(key);
        Ok(version_id)
    }

    /// Insert a delete marker for `key` and return its version ID.
    pub fn put_delete_marker(&self, bucket: &str, key: &str) -> StoreResult<String> {
        let bucket = self.bucket(bucket)?;
        let version_id = bucket.versions.write().put_delete_marker(key);
        Ok(version_id)
    }

    /// Set (or clear, with `None`) the retention of one version.
    pub fn put_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        retention: Option<Retention>,
    ) -> StoreResult<()> {
        let bucket = self.lock_enabled_bucket(bucket)?;
        let mut store = bucket.versions.write();
        let version = object_version_mut(&mut store, key, version_id)?;
        version.retention = retention;
        debug!(key, version_id, "put_object_retention completed");
        Ok(())
    }

    /// Set the legal hold of one version.
    pub fn put_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        status: LegalHoldStatus,
    ) -> StoreResult<()> {
        let bucket = self.lock_enabled_bucket(bucket)?;
        let mut store = bucket.versions.write();
        let version = object_version_mut(&mut store, key, version_id)?;
        version.legal_hold = status;
        debug!(key, version_id, ?status, "put_object_legal_hold completed");
        Ok(())
    }

    /// Total entries (versions plus delete markers) in `bucket`.
    pub fn version_count(&self, bucket: &str) -> StoreResult<usize> {
        Ok(self.bucket(bucket)?.versions.read().len())
    }

    /// Whether `bucket` still holds the given key + version.
    #[must_use]
    pub fn contains_version(&self, bucket: &str, key: &str, version_id: &str) -> bool {
        self.bucket(bucket)
            .is_ok_and(|b| b.versions.read().get_version(key, version_id).is_some())
    }

    fn bucket(&self, name: &str) -> StoreResult<Arc<MemoryBucket>> {
        self.buckets
            .get(name)
            .map(|b| Arc::clone(b.value()))
            .ok_or_else(|| {
                StoreError::service(
                    codes::NO_SUCH_BUCKET,
                    format!("The specified bucket does not exist: {name}"),
                )
            })
    }

    fn lock_enabled_bucket(&self, name: &str) -> StoreResult<Arc<MemoryBucket>> {
        let bucket = self.bucket(name)?;
        if bucket.object_lock_enabled {
            Ok(bucket)
        } else {
            Err(StoreError::service(
                codes::INVALID_REQUEST,
                "Bucket is missing Object Lock Configuration",
            ))
        }
    }

    /// Shared lookup for retention / legal-hold reads, before collapsing.
    fn lock_state<T>(
        &self,
        bucket: &str,
        version: &ObjectVersionRef,
        read: impl FnOnce(&keystore::StoredVersion) -> Option<T>,
    ) -> StoreResult<T> {
        let bucket = self.lock_enabled_bucket(bucket)?;
        let store = bucket.versions.read();
        let stored = store
            .get_version(&version.key, &version.version_id)
            .ok_or_else(|| no_such_version(&version.key, &version.version_id))?;
        if stored.is_delete_marker {
            return Err(StoreError::service(
                codes::METHOD_NOT_ALLOWED,
                "The specified method is not allowed against this resource",
            ));
        }
        read(stored).ok_or_else(|| {
            StoreError::service(
                codes::NO_SUCH_OBJECT_LOCK_CONFIGURATION,
                "The specified object does not have a ObjectLock configuration",
            )
        })
    }
}

fn object_version_mut<'a>(
    store: &'a mut VersionedKeyStore,
    key: &str,
    version_id: &str,
) -> StoreResult<&'a mut keystore::StoredVersion> {
    match store.get_version_mut(key, version_id) {
        Some(version) if !version.is_delete_marker => Ok(version),
        Some(_) => Err(StoreError::service(
            codes::METHOD_NOT_ALLOWED,
            "The specified method is not allowed against this resource",
        )),
        None => Err(no_such_version(key, version_id)),
    }
}

fn no_such_version(key: &str, version_id: &str) -> StoreError {
    StoreError::service(
        codes::NO_SUCH_VERSION,
        format!("The specified version does not exist: key={key}, version_id={version_id}"),
    )
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn list_versions(
        &self,
        bucket: &str,
        cursor: Option<&PageCursor>,
    ) -> StoreResult<VersionPage> {
        let bucket = self.bucket(bucket)?;
        let (versions, next) = bucket.versions.read().list_page(cursor, self.page_size);
        Ok(VersionPage { versions, next })
    }

    async fn get_retention(
        &self,
        bucket: &str,
        version: &ObjectVersionRef,
    ) -> StoreResult<LockQueryResult<Retention>> {
        let result = self.lock_state(bucket, version, |v| v.retention);
        LockQueryResult::collapse(result, &DEFAULT_NOT_CONFIGURED_CODES)
    }

    async fn get_legal_hold(
        &self,
        bucket: &str,
        version: &ObjectVersionRef,
    ) -> StoreResult<LockQueryResult<LegalHoldStatus>> {
        let result = self.lock_state(bucket, version, |v| Some(v.legal_hold));
        LockQueryResult::collapse(result, &DEFAULT_NOT_CONFIGURED_CODES)
    }

    async fn delete_versions(
        &self,
        bucket: &str,
        batch: &PurgeBatch,
    ) -> StoreResult<DeleteReport> {
        let bucket_name = bucket;
        let bucket = self.bucket(bucket)?;
        let now = Utc::now();

        let mut report = DeleteReport::default();
        let mut store = bucket.versions.write();
        for entry in batch.entries() {
            match store.delete_version(&entry.key, &entry.version_id, now) {
                Ok(()) => report.deleted += 1,
                Err(err) => {
                    let (code, message) = match err {
                        StoreError::Service { code, message } => (code, message),
                        other => (String::from("InternalError"), other.to_string()),
                    };
                    report.failures.push(DeleteFailure {
                        key: entry.key.clone(),
                        version_id: Some(entry.version_id.clone()),
                        code,
                        message,
                    });
                }
            }
        }

        debug!(
            bucket = %bucket_name,
            deleted_count = report.deleted,
            error_count = report.failures.len(),
            "delete_objects completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::types::RetentionMode;

    fn retention_in(hours: i64) -> Retention {
        Retention {
            mode: RetentionMode::Compliance,
            retain_until: Utc::now() + Duration::hours(hours),
        }
    }

    #[tokio::test]
    async fn test_should_report_not_configured_without_object_lock() {
        let store = InMemoryVersionStore::new();
        store.create_bucket("plain", false);
        let v1 = store.put_object("plain", "a").expect("put object");
        let version = ObjectVersionRef::version("a", v1);

        let retention = store.get_retention("plain", &version).await;
        assert!(matches!(retention, Ok(LockQueryResult::NotConfigured)));
        let hold = store.get_legal_hold("plain", &version).await;
        assert!(matches!(hold, Ok(LockQueryResult::NotConfigured)));
    }

    #[tokio::test]
    async fn test_should_report_lock_state_on_object_lock_bucket() {
        let store = InMemoryVersionStore::new();
        store.create_bucket("vault", true);
        let v1 = store.put_object("vault", "a").expect("put object");
        let version = ObjectVersionRef::version("a", v1.clone());

        // Lock-enabled bucket, but nothing set on the version yet.
        let retention = store.get_retention("vault", &version).await;
        assert!(matches!(retention, Ok(LockQueryResult::NotConfigured)));

        let r = retention_in(24);
        store
            .put_retention("vault", "a", &v1, Some(r))
            .expect("put retention");
        store
            .put_legal_hold("vault", "a", &v1, LegalHoldStatus::On)
            .expect("put legal hold");

        let retention = store.get_retention("vault", &version).await;
        assert_eq!(retention.ok(), Some(LockQueryResult::Found(r)));
        let hold = store.get_legal_hold("vault", &version).await;
        assert_eq!(hold.ok(), Some(LockQueryResult::Found(LegalHoldStatus::On)));
    }

    #[test]
    fn test_should_reject_lock_settings_without_object_lock() {
        let store = InMemoryVersionStore::new();
        store.create_bucket("plain", false);
        let v1 = store.put_object("plain", "a").expect("put object");
        let err = store
            .put_legal_hold("plain", "a", &v1, LegalHoldStatus::On)
            .expect_err("object lock is not enabled");
        assert_eq!(err.code(), Some(codes::INVALID_REQUEST));
    }

    #[tokio::test]
    async fn test_should_fail_lock_query_for_missing_version() {
        let store = InMemoryVersionStore::new();
        store.create_bucket("vault", true);
        let missing = ObjectVersionRef::version("a", "nope");
        let err = store
            .get_legal_hold("vault", &missing)
            .await
            .expect_err("version does not exist");
        assert_eq!(err.code(), Some(codes::NO_SUCH_VERSION));
    }

    #[tokio::test]
    async fn test_should_delete_unlocked_and_report_locked_items() {
        let store = InMemoryVersionStore::new();
        store.create_bucket("vault", true);
        let free = store.put_object("vault", "free").expect("put object");
        let held = store.put_object("vault", "held").expect("put object");
        store
            .put_legal_hold("vault", "held", &held, LegalHoldStatus::On)
            .expect("put legal hold");

        let batch = PurgeBatch::partition(
            vec![
                ObjectVersionRef::version("free", free.clone()),
                ObjectVersionRef::version("held", held.clone()),
            ],
            1000,
        );
        let report = store
            .delete_versions("vault", &batch[0])
            .await
            .expect("delete request");

        assert_eq!(report.deleted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].code, codes::ACCESS_DENIED);
        assert!(!store.contains_version("vault", "free", &free));
        assert!(store.contains_version("vault", "held", &held));
    }

    #[tokio::test]
    async fn test_should_fail_listing_missing_bucket() {
        let store = InMemoryVersionStore::new();
        let err = store
            .list_versions("missing", None)
            .await
            .expect_err("bucket does not exist");
        assert_eq!(err.code(), Some(codes::NO_SUCH_BUCKET));
    }
}
