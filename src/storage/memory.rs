use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::{
    errors::{AppError, Result},
    storage::{build_signed_url, ObjectStore, UrlSigner},
};

/// In-memory object store used by the test suites. Behaves like the local
/// backend, including idempotent deletes.
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    base_url: String,
    signer: UrlSigner,
}

impl MemoryStore {
    pub fn new(base_url: &str, signer: UrlSigner) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            base_url: base_url.to_string(),
            signer,
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> Result<()> {
        self.objects
            .lock()
            .await
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.lock().await.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.objects.lock().await.contains_key(path))
    }

    fn signed_url(&self, path: &str, ttl_secs: u64) -> String {
        build_signed_url(&self.base_url, &self.signer, path, ttl_secs)
    }
}
