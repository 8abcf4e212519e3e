//! S3-compatible blob store.
//!
//! Works against AWS S3, Backblaze B2, Tigris (Fly.io), MinIO and other
//! S3-compatible services. Blobs are written publicly readable and served
//! from a configured public base URL (bucket website endpoint or CDN in
//! front of it).
//!
//! # Credentials
//!
//! Credentials are provided explicitly via configuration (`key_id` and
//! `key_secret`) rather than the SDK credential chain — the primary targets
//! are S3-compatibles that only do explicit keys.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use exn::ResultExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::BlobStore;
use crate::error::{ErrorKind, Result};
use crate::models::BlobInfo;
use crate::name::validate as validate_name;

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible blob store.
///
/// # Examples
///
/// ```no_run
/// use roost_storage::backend::S3Store;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = S3Store::new(
///     "media",
///     "roost-media",
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "https://media.example.com",
///     "access_key_id",
///     "secret_access_key",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Store {
    name: String,
    client: Client,
    bucket: String,
    public_base_url: String,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Store {
    /// Create a new S3 blob store.
    ///
    /// # Arguments
    /// * `name` - A name for this store (used in display/logging)
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `public_base_url` - Base URL under which the bucket is publicly served
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        public_base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Credentials::new(key_id, key_secret, None, None, "roost-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // Exponential backoff: 1 initial + 3 retries.
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        let client = Client::from_conf(config_builder.build());
        Ok(Self {
            name: name.into(),
            client,
            bucket: bucket.into(),
            public_base_url: String::from(public_base_url.into().trim_end_matches('/')),
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.public_base_url, name)
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        // unwrap is safe: semaphore is never closed
        self.rate_limiter.clone().acquire_owned().await.unwrap()
    }
}

#[async_trait]
impl BlobStore for S3Store {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.public_base_url
    }

    async fn put(&self, name: &str, data: &[u8], content_type: &str) -> Result<String> {
        let name = validate_name(name)?;
        let _permit = self.acquire_permit().await;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(ByteStream::from(data.to_vec()))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("put {name}")))?;
        Ok(self.url_for(name))
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let name = validate_name(name)?;
        let _permit = self.acquire_permit().await;
        let output = match self.client.get_object().bucket(&self.bucket).key(name).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                exn::bail!(ErrorKind::NotFound(name.to_string()));
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Network(format!("get {name}"))),
        };
        let data = output
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network(format!("get {name}: read body")))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn head(&self, name: &str) -> Result<Option<String>> {
        let name = validate_name(name)?;
        let _permit = self.acquire_permit().await;
        match self.client.head_object().bucket(&self.bucket).key(name).send().await {
            Ok(_) => Ok(Some(self.url_for(name))),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(None),
            Err(err) => Err(err).or_raise(|| ErrorKind::Network(format!("head {name}"))),
        }
    }

    async fn list(&self) -> Result<Vec<BlobInfo>> {
        let _permit = self.acquire_permit().await;
        let mut pages = self.client.list_objects_v2().bucket(&self.bucket).into_paginator().send();
        let mut blobs = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.or_raise(|| ErrorKind::Network("list".to_string()))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                blobs.push(BlobInfo {
                    name: key.to_string(),
                    url: self.url_for(key),
                    size: object.size().unwrap_or(0).max(0) as u64,
                });
            }
        }
        Ok(blobs)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        // S3 deletes are idempotent-success; probe first so a missing blob
        // surfaces as NotFound like the other backends.
        if self.head(name).await?.is_none() {
            exn::bail!(ErrorKind::NotFound(name.to_string()));
        }
        let _permit = self.acquire_permit().await;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("delete {name}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> S3Store {
        S3Store::new(
            "test",
            "bucket",
            "auto",
            None::<String>,
            "https://media.example.com/",
            "key",
            "secret",
        )
        .unwrap()
    }

    #[test]
    fn test_url_for_strips_trailing_slash() {
        assert_eq!(store().url_for("a/b.jpg"), "https://media.example.com/a/b.jpg");
    }

    #[test]
    fn test_base_url() {
        assert_eq!(store().base_url(), "https://media.example.com");
    }
}
