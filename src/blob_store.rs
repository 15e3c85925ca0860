use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

/// Key-addressed storage for raw uploads. Both operations return a URL the
/// caller can fetch the content from; URLs may expire and should not be
/// cached.
#[async_trait]
pub trait BlobStore: Debug + Send + Sync {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String>;
    async fn get(&self, key: &str) -> Result<String>;
}

static LAST_UPLOAD_STAMP: AtomicI64 = AtomicI64::new(0);

/// Milliseconds since the epoch, strictly increasing within the process.
pub fn next_upload_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_UPLOAD_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_UPLOAD_STAMP.compare_exchange_weak(
            last,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

pub fn dataset_storage_key(user_id: i64, stamp: i64, file_name: &str) -> String {
    let file_name = file_name.replace(['/', '\\'], "_");
    format!("datasets/{user_id}/{stamp}-{file_name}")
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') {
        bail!("Invalid blob key: {key:?}");
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        bail!("Invalid blob key: {key:?}");
    }
    Ok(())
}

/// Stores blobs as files under `root` and hands out URLs below
/// `<public_url>/files/`, which the server maps back onto `root`.
#[derive(Debug)]
pub struct FilesystemBlobStore {
    root: PathBuf,
    public_url: Url,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Result<Self> {
        let public_url =
            Url::parse(public_url).with_context(|| format!("Invalid public URL {public_url}"))?;
        if public_url.cannot_be_a_base() {
            bail!("Public URL {public_url} cannot be used as a base");
        }
        Ok(Self {
            root: root.into(),
            public_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, key: &str) -> Result<String> {
        let mut url = self.public_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Public URL cannot be used as a base"))?
            .pop_if_empty()
            .push("files")
            .extend(key.split('/'));
        Ok(url.to_string())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String> {
        validate_key(key)?;
        let path = self.root.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write blob {key}"))?;

        tracing::debug!(key, content_type, bytes = data.len(), "blob stored");
        self.url_for(key)
    }

    async fn get(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        self.url_for(key)
    }
}

/// In-process blob store, used by tests and throwaway servers.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contents(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(key).map(|(data, _)| data.clone())
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String> {
        validate_key(key)?;
        self.blobs
            .write()
            .await
            .insert(key.to_string(), (data.to_vec(), content_type.to_string()));
        Ok(format!("memory://{key}"))
    }

    async fn get(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        Ok(format!("memory://{key}"))
    }
}
