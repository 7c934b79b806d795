use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<()>;

    /// Publicly resolvable URL for a stored object.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    public_base_url: String,
}

impl Storage {
    pub async fn new(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        public_base_url: &str,
        region: &str,
    ) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ))
            .endpoint_url(endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, key)
    }
}

/// Randomized object key preserving the original file extension.
/// Every upload gets a fresh key; old objects are never overwritten.
pub fn object_key(original_name: &str) -> String {
    let ext = std::path::Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty());
    match ext {
        Some(e) => format!("{}.{}", Uuid::new_v4(), e.to_lowercase()),
        None => Uuid::new_v4().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_preserves_extension() {
        let key = object_key("syllabus.PDF");
        assert!(key.ends_with(".pdf"));
        assert_eq!(key.len(), 36 + 4);
    }

    #[test]
    fn object_key_without_extension() {
        let key = object_key("README");
        assert_eq!(key.len(), 36);
    }

    #[test]
    fn object_keys_are_unique_per_upload() {
        assert_ne!(object_key("a.zip"), object_key("a.zip"));
    }
}
