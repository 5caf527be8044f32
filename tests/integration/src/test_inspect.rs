//! Inventory integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aws_sdk_s3::types::{ObjectLockLegalHold, ObjectLockLegalHoldStatus};
    use bucketsweep_core::PurgeConfig;
    use bucketsweep_core::inventory::inspect;
    use bucketsweep_core::types::LockStatus;

    use crate::{
        cleanup_bucket, count_entries, create_versioned_bucket, put_version, s3_client,
        version_store,
    };

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_summarize_without_deleting() {
        let client = s3_client();
        let bucket = create_versioned_bucket(&client, "inspect", true).await;
        put_version(&client, &bucket, "a").await;
        put_version(&client, &bucket, "a").await;
        let held = put_version(&client, &bucket, "b").await;
        client
            .put_object_legal_hold()
            .bucket(&bucket)
            .key("b")
            .version_id(&held)
            .legal_hold(
                ObjectLockLegalHold::builder()
                    .status(ObjectLockLegalHoldStatus::On)
                    .build(),
            )
            .send()
            .await
            .expect("put legal hold");
        client
            .delete_object()
            .bucket(&bucket)
            .key("c")
            .send()
            .await
            .expect("create delete marker");

        let store = Arc::new(version_store(&client));
        let inventory = inspect(store, &bucket, &PurgeConfig::default())
            .await
            .expect("inspect");

        assert_eq!(inventory.object_versions, 3);
        assert_eq!(inventory.delete_markers, 1);
        assert_eq!(inventory.distinct_keys, 3);
        assert_eq!(inventory.locked_count(), 1);
        assert_eq!(inventory.locked[0].version.key, "b");
        assert_eq!(inventory.locked[0].status, LockStatus::LegalHold);
        assert_eq!(count_entries(&client, &bucket).await, 4);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_empty_bucket() {
        let client = s3_client();
        let bucket = create_versioned_bucket(&client, "inspectempty", false).await;

        let store = Arc::new(version_store(&client));
        let inventory = inspect(store, &bucket, &PurgeConfig::default())
            .await
            .expect("inspect");

        assert_eq!(inventory.total_entries(), 0);
        assert!(inventory.locked.is_empty());

        cleanup_bucket(&client, &bucket).await;
    }
}
