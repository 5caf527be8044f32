//! Purge integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use async_trait::async_trait;
    use aws_sdk_s3::primitives::DateTime;
    use aws_sdk_s3::types::{
        ObjectLockLegalHold, ObjectLockLegalHoldStatus, ObjectLockRetention,
        ObjectLockRetentionMode,
    };
    use bucketsweep_core::types::{LockStatus, TerminalState};
    use bucketsweep_core::{
        AutoConfirm, Confirm, ConfirmationRequest, PurgeConfig, PurgeCoordinator,
    };
    use futures::{StreamExt, stream};

    use crate::{
        cleanup_bucket, count_entries, create_versioned_bucket, put_version, s3_client,
        version_store,
    };

    /// Answers "no" to every confirmation.
    #[derive(Debug)]
    struct Declined;

    #[async_trait]
    impl Confirm for Declined {
        async fn confirm(&self, _request: &ConfirmationRequest<'_>) -> bool {
            false
        }
    }

    async fn set_legal_hold(client: &aws_sdk_s3::Client, bucket: &str, key: &str, vid: &str) {
        client
            .put_object_legal_hold()
            .bucket(bucket)
            .key(key)
            .version_id(vid)
            .legal_hold(
                ObjectLockLegalHold::builder()
                    .status(ObjectLockLegalHoldStatus::On)
                    .build(),
            )
            .send()
            .await
            .expect("put legal hold");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_purge_versions_and_delete_markers() {
        let client = s3_client();
        let bucket = create_versioned_bucket(&client, "purge", false).await;
        for key in ["a.txt", "b.txt", "c.txt"] {
            put_version(&client, &bucket, key).await;
            put_version(&client, &bucket, key).await;
        }
        client
            .delete_object()
            .bucket(&bucket)
            .key("a.txt")
            .send()
            .await
            .expect("create delete marker");

        let store = Arc::new(version_store(&client));
        let outcome = PurgeCoordinator::new(store, PurgeConfig::default())
            .purge(&bucket, &AutoConfirm)
            .await
            .expect("purge");

        assert_eq!(outcome.state, TerminalState::Empty);
        assert_eq!(outcome.deleted_count, 7);
        assert_eq!(count_entries(&client, &bucket).await, 0);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_skip_legal_hold_and_governance_retention() {
        let client = s3_client();
        let bucket = create_versioned_bucket(&client, "purgelock", true).await;
        put_version(&client, &bucket, "free-1").await;
        put_version(&client, &bucket, "free-2").await;
        let held = put_version(&client, &bucket, "held").await;
        set_legal_hold(&client, &bucket, "held", &held).await;
        let retained = put_version(&client, &bucket, "retained").await;
        client
            .put_object_retention()
            .bucket(&bucket)
            .key("retained")
            .version_id(&retained)
            .retention(
                ObjectLockRetention::builder()
                    .mode(ObjectLockRetentionMode::Governance)
                    .retain_until_date(DateTime::from(
                        SystemTime::now() + Duration::from_secs(3600),
                    ))
                    .build(),
            )
            .send()
            .await
            .expect("put retention");

        let store = Arc::new(version_store(&client));
        let outcome = PurgeCoordinator::new(store, PurgeConfig::default())
            .purge(&bucket, &AutoConfirm)
            .await
            .expect("purge");

        assert_eq!(outcome.state, TerminalState::EmptyExceptLocked);
        assert_eq!(outcome.deleted_count, 2);
        assert_eq!(outcome.locked_count, 2);
        assert_eq!(count_entries(&client, &bucket).await, 2);
        let statuses: Vec<LockStatus> = outcome.locked.iter().map(|e| e.status).collect();
        assert_eq!(statuses[0], LockStatus::LegalHold);
        assert!(matches!(statuses[1], LockStatus::RetentionLocked { .. }));

        // Running again changes nothing.
        let store = Arc::new(version_store(&client));
        let again = PurgeCoordinator::new(store, PurgeConfig::default())
            .purge(&bucket, &AutoConfirm)
            .await
            .expect("second purge");
        assert_eq!(again.state, TerminalState::EmptyExceptLocked);
        assert_eq!(again.deleted_count, 0);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_page_and_batch_large_buckets() {
        let client = s3_client();
        let bucket = create_versioned_bucket(&client, "purgebig", false).await;
        stream::iter(0..1205)
            .for_each_concurrent(32, |i| {
                let client = client.clone();
                let bucket = bucket.clone();
                async move {
                    put_version(&client, &bucket, &format!("obj-{i:05}")).await;
                }
            })
            .await;

        let store = Arc::new(version_store(&client));
        let outcome = PurgeCoordinator::new(store, PurgeConfig::default())
            .purge(&bucket, &AutoConfirm)
            .await
            .expect("purge");

        assert_eq!(outcome.state, TerminalState::Empty);
        assert_eq!(outcome.deleted_count, 1205);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_leave_bucket_untouched_when_declined() {
        let client = s3_client();
        let bucket = create_versioned_bucket(&client, "purgeno", false).await;
        put_version(&client, &bucket, "keep.txt").await;

        let store = Arc::new(version_store(&client));
        let outcome = PurgeCoordinator::new(store, PurgeConfig::default())
            .purge(&bucket, &Declined)
            .await
            .expect("purge");

        assert_eq!(outcome.state, TerminalState::Declined);
        assert_eq!(outcome.deleted_count, 0);
        assert_eq!(count_entries(&client, &bucket).await, 1);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_fail_for_missing_bucket() {
        let client = s3_client();
        let store = Arc::new(version_store(&client));
        let err = PurgeCoordinator::new(store, PurgeConfig::default())
            .purge("test-does-not-exist-bucketsweep", &AutoConfirm)
            .await
            .expect_err("bucket does not exist");

        assert_eq!(
            err.store_error().and_then(|e| e.code()),
            Some("NoSuchBucket")
        );
    }
}
