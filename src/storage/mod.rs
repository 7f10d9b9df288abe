use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::errors::Result;

pub mod local;
pub mod memory;
pub mod sign;

pub use sign::UrlSigner;

/// Uniform interface over the blob backend. Objects are opaque ciphertext;
/// paths follow the `{user_id}/{file_id}.enc` convention produced by
/// [`object_path`], never a client-supplied string.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Returns `AppError::NotFound` for a missing object.
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Idempotent: deleting a nonexistent object succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Pre-signed download URL valid for `ttl_secs` seconds.
    fn signed_url(&self, path: &str, ttl_secs: u64) -> String;
}

pub fn object_path(user_id: Uuid, file_id: Uuid) -> String {
    format!("{}/{}.enc", user_id, file_id)
}

pub(crate) fn build_signed_url(
    base_url: &str,
    signer: &UrlSigner,
    path: &str,
    ttl_secs: u64,
) -> String {
    let expires_at = Utc::now().timestamp() + ttl_secs as i64;
    let signature = signer.sign(path, expires_at);
    format!(
        "{}/storage/{}?expires={}&signature={}",
        base_url.trim_end_matches('/'),
        path,
        expires_at,
        signature
    )
}
