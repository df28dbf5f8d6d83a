// ABOUTME: AWS S3 implementation of the object store
// ABOUTME: Upload, download, delete and presign with exponential backoff on transient failures

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use std::time::Duration;
use tracing::{debug, warn};

use estately_storage::{ObjectMetadata, ObjectRef, ObjectStore, StorageResult};

use crate::config::S3Settings;
use crate::error::{CloudError, CloudResult};

/// S3 (or S3-compatible) bucket used as the upload object store
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
    key_prefix: String,
    max_retry_elapsed: Duration,
}

impl S3ObjectStore {
    /// Build a client from settings; credentials come from the standard AWS chain
    pub async fn from_settings(settings: &S3Settings) -> CloudResult<Self> {
        settings.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Custom endpoints (MinIO, R2) generally need path-style addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.endpoint.is_some())
            .build();

        Ok(Self::with_client(Client::from_conf(s3_config), settings))
    }

    pub fn with_client(client: Client, settings: &S3Settings) -> Self {
        Self {
            client,
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
            key_prefix: settings.key_prefix.clone(),
            max_retry_elapsed: Duration::from_secs(30),
        }
    }

    pub fn with_max_retry_elapsed(mut self, limit: Duration) -> Self {
        self.max_retry_elapsed = limit;
        self
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Stable (unsigned) URL of an object
    fn object_url(&self, key: &str) -> String {
        let full_key = self.full_key(key);
        match &self.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.bucket,
                full_key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, full_key
            ),
        }
    }

    /// Apply retry logic for S3 operations
    async fn with_retry<F, T, Fut>(&self, operation: F) -> CloudResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = CloudResult<T>>,
    {
        use backoff::{future::retry, ExponentialBackoff};

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            match operation().await {
                Ok(result) => Ok(result),
                Err(e) if e.is_retryable() => {
                    warn!("Transient S3 failure, retrying: {}", e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    fn normalize_content_type(content_type: &str) -> String {
        match content_type.parse::<mime::Mime>() {
            Ok(parsed) => parsed.essence_str().to_string(),
            Err(_) => mime::APPLICATION_OCTET_STREAM.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<ObjectRef> {
        let full_key = self.full_key(key);
        let body = Bytes::from(data);
        let content_type = Self::normalize_content_type(content_type);
        debug!("Uploading {} ({} bytes) to s3://{}", full_key, body.len(), self.bucket);

        self.with_retry(|| {
            let body = body.clone();
            let full_key = full_key.clone();
            let content_type = content_type.clone();
            async move {
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(&full_key)
                    .body(ByteStream::from(body))
                    .content_type(content_type)
                    .send()
                    .await
                    .map_err(|e| CloudError::from_sdk(e, &full_key))
            }
        })
        .await?;

        Ok(ObjectRef {
            key: key.to_string(),
            url: self.object_url(key),
        })
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let full_key = self.full_key(key);

        let output = self
            .with_retry(|| async {
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(&full_key)
                    .send()
                    .await
                    .map_err(|e| CloudError::from_sdk(e, key))
            })
            .await?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| CloudError::Network(format!("Failed to read object body: {}", e)))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let full_key = self.full_key(key);

        let result = self
            .with_retry(|| async {
                self.client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(&full_key)
                    .send()
                    .await
                    .map_err(|e| CloudError::from_sdk(e, key))
            })
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(CloudError::NotFound(_)) => {
                debug!("Object {} already absent", full_key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn head_metadata(&self, key: &str) -> StorageResult<ObjectMetadata> {
        let full_key = self.full_key(key);

        let head = self
            .with_retry(|| async {
                self.client
                    .head_object()
                    .bucket(&self.bucket)
                    .key(&full_key)
                    .send()
                    .await
                    .map_err(|e| CloudError::from_sdk(e, key))
            })
            .await?;

        let last_modified = head.last_modified().and_then(|dt| {
            Utc.timestamp_opt(dt.secs(), dt.subsec_nanos()).single()
        });

        Ok(ObjectMetadata {
            content_type: head
                .content_type()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM.essence_str())
                .to_string(),
            content_length: head.content_length().unwrap_or(0).max(0) as u64,
            last_modified,
        })
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        let full_key = self.full_key(key);
        let presign = PresigningConfig::expires_in(ttl)
            .map_err(|e| CloudError::Presign(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .presigned(presign)
            .await
            .map_err(|e| CloudError::from_sdk(e, key))?;

        Ok(request.uri().to_string())
    }
}
