//! Version Enumerator: a lazy, paginated view of every entry in a bucket.
//!
//! Each call to [`VersionEnumerator::scan`] starts from the first page and
//! re-reads the store; nothing is carried over from a previous scan. Pages
//! are fetched only as the stream is polled.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::debug;

use crate::error::{PurgeError, PurgeResult};
use crate::store::{PageCursor, StoreError, VersionStore};
use crate::types::ObjectVersionRef;

/// Pagination state between page fetches.
enum PageState {
    Start,
    Next(PageCursor),
    Done,
}

/// Produces the current object versions and delete markers of a bucket.
#[derive(Debug)]
pub struct VersionEnumerator<S> {
    store: Arc<S>,
}

impl<S> Clone for VersionEnumerator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: VersionStore> VersionEnumerator<S> {
    /// Create an enumerator over `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stream every entry of `bucket`, page by page.
    ///
    /// A page-fetch failure ends the stream with [`PurgeError::Enumeration`].
    /// So does a store that hands back the same cursor it was given, which
    /// would otherwise paginate forever.
    #[must_use]
    pub fn scan(&self, bucket: &str) -> BoxStream<'static, PurgeResult<ObjectVersionRef>> {
        let store = Arc::clone(&self.store);
        let bucket = bucket.to_owned();

        stream::try_unfold(PageState::Start, move |state| {
            let store = Arc::clone(&store);
            let bucket = bucket.clone();
            async move {
                let cursor = match state {
                    PageState::Start => None,
                    PageState::Next(cursor) => Some(cursor),
                    PageState::Done => return Ok(None),
                };

                let page = store
                    .list_versions(&bucket, cursor.as_ref())
                    .await
                    .map_err(|source| PurgeError::Enumeration {
                        bucket: bucket.clone(),
                        source,
                    })?;

                debug!(
                    bucket = %bucket,
                    entries = page.versions.len(),
                    has_more = page.next.is_some(),
                    "fetched version page"
                );

                let next_state = match page.next {
                    None => PageState::Done,
                    Some(next) if cursor.as_ref() == Some(&next) => {
                        return Err(PurgeError::Enumeration {
                            bucket,
                            source: StoreError::Malformed(format!(
                                "pagination did not advance past key marker {}",
                                next.key_marker
                            )),
                        });
                    }
                    Some(next) => PageState::Next(next),
                };

                let entries = stream::iter(page.versions.into_iter().map(Ok::<_, PurgeError>));
                Ok(Some((entries, next_state)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// Count every entry of `bucket` (versions plus delete markers).
    pub async fn count(&self, bucket: &str) -> PurgeResult<usize> {
        self.scan(bucket)
            .try_fold(0_usize, |count, _| async move { Ok(count + 1) })
            .await
    }
}
