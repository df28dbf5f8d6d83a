//! Integration tests for the S3 object store

use estately_cloud::{CloudError, S3ObjectStore, S3Settings};

fn minio_settings() -> S3Settings {
    S3Settings {
        bucket: "estately-test".to_string(),
        region: "us-east-1".to_string(),
        endpoint: Some("http://127.0.0.1:9000".to_string()),
        key_prefix: "it/".to_string(),
    }
}

#[tokio::test]
async fn test_store_creation_with_custom_endpoint() {
    let result = S3ObjectStore::from_settings(&minio_settings()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_store_creation_requires_bucket() {
    let settings = S3Settings {
        bucket: String::new(),
        ..minio_settings()
    };
    let result = S3ObjectStore::from_settings(&settings).await;
    assert!(matches!(result, Err(CloudError::Configuration(_))));
}

#[tokio::test]
async fn test_store_creation_rejects_non_http_endpoint() {
    let settings = S3Settings {
        endpoint: Some("ftp://files.example.com".to_string()),
        ..minio_settings()
    };
    assert!(S3ObjectStore::from_settings(&settings).await.is_err());
}

/// Round trip against a real bucket configured through ESTATELY_S3_* variables
#[cfg(feature = "integration-tests")]
mod live {
    use super::*;
    use estately_storage::ObjectStore;
    use std::time::Duration;

    #[tokio::test]
    async fn test_put_get_head_sign_delete() {
        let settings = S3Settings::load(&S3Settings::default_path())
            .await
            .expect("S3 settings must be configured for integration tests");
        let store = S3ObjectStore::from_settings(&settings).await.unwrap();
        let key = format!("integration/{}.txt", chrono::Utc::now().timestamp_millis());

        let stored = store
            .put(&key, b"estately".to_vec(), "text/plain")
            .await
            .unwrap();
        assert_eq!(stored.key, key);

        assert_eq!(store.get(&key).await.unwrap(), b"estately".to_vec());
        let meta = store.head_metadata(&key).await.unwrap();
        assert_eq!(meta.content_length, 8);
        assert!(meta.content_type.starts_with("text/plain"));

        let url = store.signed_url(&key, Duration::from_secs(60)).await.unwrap();
        assert!(url.contains("X-Amz-Signature"));

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap_err().is_not_found());
        // Deleting again is not an error
        store.delete(&key).await.unwrap();
    }
}
