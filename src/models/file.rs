use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Client-encrypted metadata blob. Every field is ciphertext; the server
/// validates the shape and stores it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedMetadata {
    pub encrypted_size: String,
    pub encrypted_type: String,
    pub encrypted_original_name: String,
}

/// One row per logical uploaded object.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub encrypted_filename: String,
    pub encrypted_metadata: serde_json::Value,
    pub file_size: i64,
    pub storage_path: String,
    pub uploaded_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub encryption_algorithm: String,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub encrypted_filename: String,
    pub encrypted_metadata: EncryptedMetadata,
    /// Declared size in bytes, used for quota accounting only.
    pub file_size: i64,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub encrypted_filename: String,
    pub encrypted_metadata: serde_json::Value,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub encryption_algorithm: String,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            encrypted_filename: record.encrypted_filename,
            encrypted_metadata: record.encrypted_metadata,
            file_size: record.file_size,
            uploaded_at: record.uploaded_at,
            last_accessed: record.last_accessed,
            encryption_algorithm: record.encryption_algorithm,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct FileListResult {
    pub files: Vec<FileResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub download_url: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub file_id: Uuid,
    pub deleted_at: DateTime<Utc>,
}
