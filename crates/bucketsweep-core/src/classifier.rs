//! Lock Classifier: decides whether one entry may be deleted.
//!
//! Both the retention and the legal-hold query are issued for every object
//! version. "Not configured" answers arrive as
//! [`LockQueryResult::NotConfigured`] and count as no restriction; every
//! other store failure is fatal to the pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::{PurgeError, PurgeResult};
use crate::store::{LockQueryResult, StoreError, VersionStore};
use crate::types::{LegalHoldStatus, LockStatus, ObjectVersionRef, Retention};

/// Classifies object versions by querying their lock state.
#[derive(Debug)]
pub struct LockClassifier<S> {
    store: Arc<S>,
}

impl<S> Clone for LockClassifier<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: VersionStore> LockClassifier<S> {
    /// Create a classifier over `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Classify one entry.
    ///
    /// Delete markers carry no lock state and are returned as
    /// [`LockStatus::Unlocked`] without querying the store.
    pub async fn classify(
        &self,
        bucket: &str,
        version: &ObjectVersionRef,
    ) -> PurgeResult<LockStatus> {
        if version.is_delete_marker {
            return Ok(LockStatus::Unlocked);
        }

        let (retention, legal_hold) = tokio::try_join!(
            self.store.get_retention(bucket, version),
            self.store.get_legal_hold(bucket, version),
        )
        .map_err(|source| classification_error(version, source))?;

        let status = resolve(retention, legal_hold, Utc::now());
        debug!(
            bucket = %bucket,
            key = %version.key,
            version_id = %version.version_id,
            %status,
            "classified version"
        );
        Ok(status)
    }

    /// Classify every entry of `entries` with at most `concurrency` entries
    /// being queried at once.
    ///
    /// Pages keep being fetched while earlier entries are classified. Results
    /// come back in completion order. The first error ends the stream.
    #[must_use]
    pub fn classify_stream(
        &self,
        bucket: &str,
        entries: BoxStream<'static, PurgeResult<ObjectVersionRef>>,
        concurrency: usize,
    ) -> BoxStream<'static, PurgeResult<(ObjectVersionRef, LockStatus)>> {
        let classifier = self.clone();
        let bucket = bucket.to_owned();

        entries
            .map_ok(move |version| {
                let classifier = classifier.clone();
                let bucket = bucket.clone();
                async move {
                    let status = classifier.classify(&bucket, &version).await?;
                    Ok::<_, PurgeError>((version, status))
                }
            })
            .try_buffer_unordered(concurrency.max(1))
            .boxed()
    }
}

fn classification_error(version: &ObjectVersionRef, source: StoreError) -> PurgeError {
    PurgeError::Classification {
        key: version.key.clone(),
        version_id: version.version_id.clone(),
        source,
    }
}

/// Combine both query answers into a [`LockStatus`].
///
/// An unexpired retention wins over a legal hold when both are present.
#[must_use]
pub fn resolve(
    retention: LockQueryResult<Retention>,
    legal_hold: LockQueryResult<LegalHoldStatus>,
    now: DateTime<Utc>,
) -> LockStatus {
    if let Some(r) = retention.found().filter(|r| r.is_active_at(now)) {
        return LockStatus::RetentionLocked {
            mode: r.mode,
            retain_until: r.retain_until,
        };
    }
    if legal_hold.found() == Some(LegalHoldStatus::On) {
        return LockStatus::LegalHold;
    }
    LockStatus::Unlocked
}
