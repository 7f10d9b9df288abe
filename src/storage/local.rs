use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::{
    errors::{AppError, Result},
    storage::{build_signed_url, ObjectStore, UrlSigner},
};

/// Filesystem-backed object store. The base directory is the "bucket"; the
/// object path scheme produces one directory per user under it.
pub struct LocalStore {
    base_path: PathBuf,
    base_url: String,
    signer: UrlSigner,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P, base_url: &str, signer: UrlSigner) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path)
            .map_err(|e| AppError::Storage(format!("Failed to create storage directory: {}", e)))?;

        Ok(Self {
            base_path,
            base_url: base_url.to_string(),
            signer,
        })
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> Result<()> {
        // Content type is not persisted: everything served back is ciphertext.
        let full_path = self.full_path(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(&full_path, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write object: {}", e)))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path);

        match fs::read(&full_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound),
            Err(e) => Err(AppError::Storage(format!("Failed to read object: {}", e))),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete object: {}", e))),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.full_path(path).exists())
    }

    fn signed_url(&self, path: &str, ttl_secs: u64) -> String {
        build_signed_url(&self.base_url, &self.signer, path, ttl_secs)
    }
}
