//! Versioned key storage for the in-memory store.
//!
//! Each key maps to its version list, newest first. A `BTreeMap` keeps keys
//! sorted so that marker-based pagination is stable between pages.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::store::{PageCursor, StoreError, codes};
use crate::types::{LegalHoldStatus, ObjectVersionRef, Retention};

/// One stored entry: an object version or a delete marker.
#[derive(Debug, Clone)]
pub(crate) struct StoredVersion {
    pub(crate) version_id: String,
    pub(crate) is_delete_marker: bool,
    pub(crate) retention: Option<Retention>,
    pub(crate) legal_hold: LegalHoldStatus,
}

impl StoredVersion {
    fn new(is_delete_marker: bool) -> Self {
        Self {
            version_id: generate_version_id(),
            is_delete_marker,
            retention: None,
            legal_hold: LegalHoldStatus::Off,
        }
    }

    fn to_ref(&self, key: &str) -> ObjectVersionRef {
        ObjectVersionRef {
            key: key.to_owned(),
            version_id: self.version_id.clone(),
            is_delete_marker: self.is_delete_marker,
        }
    }
}

/// Versioned key store. Each key maps to an ordered list of versions
/// (newest first).
#[derive(Debug, Default)]
pub(crate) struct VersionedKeyStore {
    objects: BTreeMap<String, Vec<StoredVersion>>,
}

impl VersionedKeyStore {
    /// Add a new object version and return its version ID.
    pub(crate) fn put(&mut self, key: &str) -> String {
        let version = StoredVersion::new(false);
        let version_id = version.version_id.clone();
        debug!(key, version = %version_id, "storing versioned object");
        self.objects
            .entry(key.to_owned())
            .or_default()
            .insert(0, version);
        version_id
    }

    /// Add a delete marker and return its version ID.
    pub(crate) fn put_delete_marker(&mut self, key: &str) -> String {
        let marker = StoredVersion::new(true);
        let version_id = marker.version_id.clone();
        debug!(key, version_id = %version_id, "inserted delete marker");
        self.objects
            .entry(key.to_owned())
            .or_default()
            .insert(0, marker);
        version_id
    }

    /// Get a specific version (object or delete marker).
    pub(crate) fn get_version(&self, key: &str, version_id: &str) -> Option<&StoredVersion> {
        self.objects
            .get(key)
            .and_then(|versions| versions.iter().find(|v| v.version_id == version_id))
    }

    /// Get a specific version for modification.
    pub(crate) fn get_version_mut(
        &mut self,
        key: &str,
        version_id: &str,
    ) -> Option<&mut StoredVersion> {
        self.objects
            .get_mut(key)
            .and_then(|versions| versions.iter_mut().find(|v| v.version_id == version_id))
    }

    /// Permanently remove one version, honoring Object Lock.
    ///
    /// Removing a version that does not exist succeeds, as it does on S3.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` if the version has a legal hold enabled or a
    /// retention period that has not yet expired at `now`.
    pub(crate) fn delete_version(
        &mut self,
        key: &str,
        version_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let Some(versions) = self.objects.get_mut(key) else {
            return Ok(());
        };
        let Some(idx) = versions.iter().position(|v| v.version_id == version_id) else {
            return Ok(());
        };

        let version = &versions[idx];
        if version.legal_hold == LegalHoldStatus::On {
            return Err(StoreError::service(
                codes::ACCESS_DENIED,
                "Object Lock legal hold is enabled on this object",
            ));
        }
        if version.retention.is_some_and(|r| r.is_active_at(now)) {
            return Err(StoreError::service(
                codes::ACCESS_DENIED,
                "Object Lock retention period has not expired",
            ));
        }

        versions.remove(idx);
        if versions.is_empty() {
            self.objects.remove(key);
        }
        Ok(())
    }

    /// Total number of entries (versions plus delete markers).
    pub(crate) fn len(&self) -> usize {
        self.objects.values().map(Vec::len).sum()
    }

    /// List up to `max_keys` entries after `cursor`, in key order and newest
    /// version first within a key.
    pub(crate) fn list_page(
        &self,
        cursor: Option<&PageCursor>,
        max_keys: usize,
    ) -> (Vec<ObjectVersionRef>, Option<PageCursor>) {
        let key_marker = cursor.map_or("", |c| c.key_marker.as_str());
        let version_id_marker = cursor
            .and_then(|c| c.version_id_marker.as_deref())
            .unwrap_or("");

        let mut page = Vec::new();
        let mut truncated = false;

        'outer: for (key, versions) in self.objects.range(key_marker.to_owned()..) {
            // Without a version marker the marker key itself was fully listed.
            if key == key_marker && version_id_marker.is_empty() {
                continue;
            }

            // A marker version removed between pages no longer anchors the
            // resume point; relist the whole key rather than skip it.
            let mut skip_versions =
                key == key_marker && versions.iter().any(|v| v.version_id == version_id_marker);
            for version in versions {
                if skip_versions {
                    if version.version_id == version_id_marker {
                        skip_versions = false;
                    }
                    continue;
                }

                if page.len() >= max_keys {
                    truncated = true;
                    break 'outer;
                }
                page.push(version.to_ref(key));
            }
        }

        let next = if truncated {
            page.last().map(|last: &ObjectVersionRef| PageCursor {
                key_marker: last.key.clone(),
                version_id_marker: Some(last.version_id.clone()),
            })
        } else {
            None
        };

        (page, next)
    }
}

/// Generate a unique version ID for object versions and delete markers.
fn generate_version_id() -> String {
    Uuid::new_v4().to_string()
}
