//! Read-only bucket inventory.
//!
//! Runs the same scan and classification as a purge pass but never deletes
//! and never asks for confirmation.

use std::collections::HashSet;
use std::sync::Arc;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::LockClassifier;
use crate::config::PurgeConfig;
use crate::enumerator::VersionEnumerator;
use crate::error::{PurgeError, PurgeResult};
use crate::store::VersionStore;
use crate::types::LockedEntry;

/// Summary of every entry in a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInventory {
    /// The inspected bucket.
    pub bucket: String,
    /// Number of object versions.
    pub object_versions: usize,
    /// Number of delete markers.
    pub delete_markers: usize,
    /// Number of distinct keys across versions and delete markers.
    pub distinct_keys: usize,
    /// Locked object versions, in key order.
    pub locked: Vec<LockedEntry>,
}

impl BucketInventory {
    /// Versions plus delete markers.
    #[must_use]
    pub fn total_entries(&self) -> usize {
        self.object_versions + self.delete_markers
    }

    /// Number of locked versions.
    #[must_use]
    pub fn locked_count(&self) -> usize {
        self.locked.len()
    }
}

/// Scan and classify `bucket` without modifying it.
pub async fn inspect<S: VersionStore>(
    store: Arc<S>,
    bucket: &str,
    config: &PurgeConfig,
) -> PurgeResult<BucketInventory> {
    config.validate()?;

    let entries = VersionEnumerator::new(Arc::clone(&store)).scan(bucket);
    let classified = LockClassifier::new(store).classify_stream(
        bucket,
        entries,
        config.classify_concurrency,
    );

    let mut keys = HashSet::new();
    let mut inventory = classified
        .try_fold(
            BucketInventory {
                bucket: bucket.to_owned(),
                ..BucketInventory::default()
            },
            |mut inventory, (version, status)| {
                if version.is_delete_marker {
                    inventory.delete_markers += 1;
                } else {
                    inventory.object_versions += 1;
                }
                keys.insert(version.key.clone());
                if status.is_locked() {
                    inventory.locked.push(LockedEntry { version, status });
                }
                futures::future::ready(Ok::<_, PurgeError>(inventory))
            },
        )
        .await?;

    inventory.distinct_keys = keys.len();
    inventory.locked.sort_by(|a, b| {
        (&a.version.key, &a.version.version_id).cmp(&(&b.version.key, &b.version.version_id))
    });

    info!(
        bucket = %bucket,
        versions = inventory.object_versions,
        delete_markers = inventory.delete_markers,
        locked = inventory.locked.len(),
        "inventory complete"
    );
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::memory::InMemoryVersionStore;
    use crate::types::{LegalHoldStatus, LockStatus, Retention, RetentionMode};

    #[tokio::test]
    async fn test_should_summarize_bucket_contents() {
        let store = Arc::new(InMemoryVersionStore::with_page_size(2));
        store.create_bucket("vault", true);
        store.put_object("vault", "a").expect("put object");
        store.put_object("vault", "a").expect("put object");
        store.put_delete_marker("vault", "a").expect("delete marker");
        let held = store.put_object("vault", "b").expect("put object");
        store
            .put_legal_hold("vault", "b", &held, LegalHoldStatus::On)
            .expect("put legal hold");
        let kept = store.put_object("vault", "c").expect("put object");
        store
            .put_retention(
                "vault",
                "c",
                &kept,
                Some(Retention {
                    mode: RetentionMode::Governance,
                    retain_until: Utc::now() + Duration::days(7),
                }),
            )
            .expect("put retention");

        let inventory = inspect(Arc::clone(&store), "vault", &PurgeConfig::default())
            .await
            .expect("inspect");

        assert_eq!(inventory.object_versions, 4);
        assert_eq!(inventory.delete_markers, 1);
        assert_eq!(inventory.total_entries(), 5);
        assert_eq!(inventory.distinct_keys, 3);
        assert_eq!(inventory.locked_count(), 2);
        assert_eq!(inventory.locked[0].status, LockStatus::LegalHold);
        assert!(matches!(
            inventory.locked[1].status,
            LockStatus::RetentionLocked {
                mode: RetentionMode::Governance,
                ..
            }
        ));
        // Read-only.
        assert_eq!(store.version_count("vault").expect("count"), 5);
    }

    #[tokio::test]
    async fn test_should_report_empty_inventory() {
        let store = Arc::new(InMemoryVersionStore::new());
        store.create_bucket("empty", false);
        let inventory = inspect(store, "empty", &PurgeConfig::default())
            .await
            .expect("inspect");
        assert_eq!(
            inventory,
            BucketInventory {
                bucket: "empty".to_owned(),
                ..BucketInventory::default()
            }
        );
    }
}
