use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::config::{S3Config, StorageConfig};

/// Flat key/value object store for uploaded documents and generated letters.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    /// `Ok(None)` when no object exists under `key`.
    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Bytes>>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
}

pub async fn from_config(config: &StorageConfig) -> anyhow::Result<std::sync::Arc<dyn StorageClient>> {
    Ok(match config {
        StorageConfig::Local { root } => std::sync::Arc::new(LocalStorage::new(root).await?),
        StorageConfig::S3(s3) => std::sync::Arc::new(S3Storage::new(s3).await?),
    })
}

/// Objects as files directly under one directory.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        // keys are flat; anything that could escape the root is refused
        anyhow::ensure!(
            !key.is_empty() && !key.contains(['/', '\\']) && key != "." && key != "..",
            "invalid storage key {key:?}"
        );
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        debug!(key, bytes = body.len(), "stored object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Bytes>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(config: &S3Config) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Bytes>> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        let output = match res {
            Ok(o) => o,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None)
            }
            Err(e) => return Err(e).context("s3 get_object"),
        };
        let data = output
            .body
            .collect()
            .await
            .context("s3 read object body")?
            .into_bytes();
        Ok(Some(data))
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }
}

#[cfg(test)]
mod storage_tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("admissions-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn local_put_get_delete() {
        let dir = scratch_dir("local");
        let storage = LocalStorage::new(&dir).await.unwrap();

        storage
            .put_object("a.pdf", Bytes::from_static(b"%PDF-1.3"), "application/pdf")
            .await
            .unwrap();
        let got = storage.get_object("a.pdf").await.unwrap();
        assert_eq!(got.as_deref(), Some(&b"%PDF-1.3"[..]));

        storage.delete_object("a.pdf").await.unwrap();
        assert!(storage.get_object("a.pdf").await.unwrap().is_none());
        // deleting twice is fine
        storage.delete_object("a.pdf").await.unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn local_refuses_keys_outside_root() {
        let dir = scratch_dir("escape");
        let storage = LocalStorage::new(&dir).await.unwrap();
        assert!(storage
            .put_object("../evil", Bytes::new(), "text/plain")
            .await
            .is_err());
        assert!(storage.get_object("sub/dir").await.is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
