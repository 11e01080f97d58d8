use crate::common::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Object-storage abstraction for re-hosted images.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store `bytes` under a name derived from `path`, returning the
    /// internal URL of the stored object.
    async fn put(&self, bytes: &[u8], path: &str) -> Result<String>;

    /// Whether `url` refers to an object held by this store.
    async fn exists(&self, url: &str) -> Result<bool>;
}

/// Content-addressed filesystem store. Objects land at
/// `root/sha256/aa/bb/<hex>[.ext]` and are served under `url_prefix`.
/// Writing the same bytes twice is a no-op.
pub struct FsAssetStore {
    root: PathBuf,
    url_prefix: String,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix: String = url_prefix.into();
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    fn object_name(bytes: &[u8], path: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hex = hex::encode(hasher.finalize());
        match extension_of(path) {
            Some(ext) => format!("{}.{}", hex, ext),
            None => hex,
        }
    }
}

fn extension_of(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn put(&self, bytes: &[u8], path: &str) -> Result<String> {
        let name = Self::object_name(bytes, path);
        let dir = self.root.join("sha256").join(&name[0..2]).join(&name[2..4]);
        std::fs::create_dir_all(&dir)?;
        let file = dir.join(&name);
        if !file.exists() {
            std::fs::write(&file, bytes)?;
        }
        Ok(format!(
            "{}/sha256/{}/{}/{}",
            self.url_prefix,
            &name[0..2],
            &name[2..4],
            name
        ))
    }

    async fn exists(&self, url: &str) -> Result<bool> {
        let Some(rel) = url.strip_prefix(&self.url_prefix) else {
            return Ok(false);
        };
        let rel = rel.trim_start_matches('/');
        Ok(self.root.join(rel).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_is_content_addressed_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAssetStore::new(dir.path(), "/assets");

        let url1 = store.put(b"hero bytes", "hero.jpg").await.unwrap();
        let url2 = store.put(b"hero bytes", "other/name.jpg").await.unwrap();
        assert_eq!(url1, url2);
        assert!(url1.starts_with("/assets/sha256/"));
        assert!(url1.ends_with(".jpg"));
        assert!(store.exists(&url1).await.unwrap());
    }

    #[tokio::test]
    async fn exists_rejects_foreign_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAssetStore::new(dir.path(), "/assets");
        assert!(!store.exists("https://cdn.example.com/x.jpg").await.unwrap());
    }

    #[test]
    fn extension_is_extracted_conservatively() {
        assert_eq!(extension_of("https://x/y/hero.jpg"), Some("jpg"));
        assert_eq!(extension_of("hero"), None);
        assert_eq!(extension_of("a.b/c"), None);
    }
}
