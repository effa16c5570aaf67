use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;

use crate::config::StorageConfig;
use crate::images::services::CheckedImage;

/// Object storage for recipe images, addressed by key. Keys are never reused:
/// a new upload always gets a new key.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    async fn put_image(&self, key: &str, image: &CheckedImage) -> anyhow::Result<()>;
    /// Removing a key that is already gone succeeds.
    async fn delete_image(&self, key: &str) -> anyhow::Result<()>;
    async fn image_url(&self, key: &str, seconds: u64) -> anyhow::Result<String>;
}

/// Objects never change under a key, so clients may cache them for good.
const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// S3/MinIO bucket with path-style addressing.
#[derive(Clone)]
pub struct S3ImageStorage {
    client: Client,
    bucket: String,
}

impl S3ImageStorage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!cfg.bucket.is_empty(), "MINIO_BUCKET must not be empty");
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "recipebox-env",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl ImageStorage for S3ImageStorage {
    async fn put_image(&self, key: &str, image: &CheckedImage) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(image.body.clone()))
            .content_type(image.content_type())
            .cache_control(IMAGE_CACHE_CONTROL)
            .send()
            .await
            .with_context(|| format!("s3 put {} ({})", key, image.content_type()))?;
        Ok(())
    }

    async fn delete_image(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("s3 delete {}", key))?;
        Ok(())
    }

    async fn image_url(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        let req = self.client.get_object().bucket(&self.bucket).key(key);
        let presigned = req
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(seconds),
            )?)
            .await
            .with_context(|| format!("s3 presign {}", key))?;
        Ok(presigned.uri().to_string())
    }
}

/// In-process storage used by tests; remembers which keys are live.
#[cfg(test)]
#[derive(Default)]
pub struct FakeImageStorage {
    pub objects: std::sync::Mutex<std::collections::BTreeMap<String, String>>,
}

#[cfg(test)]
impl FakeImageStorage {
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
#[async_trait]
impl ImageStorage for FakeImageStorage {
    async fn put_image(&self, key: &str, image: &CheckedImage) -> anyhow::Result<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), image.content_type().to_string());
        Ok(())
    }

    async fn delete_image(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn image_url(&self, key: &str, _seconds: u64) -> anyhow::Result<String> {
        Ok(format!("https://fake.local/{}", key))
    }
}
