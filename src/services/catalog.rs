use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    models::{FileRecord, LargestFile},
};

const FILE_COLUMNS: &str = "id, user_id, encrypted_filename, encrypted_metadata, file_size, \
                            storage_path, uploaded_at, last_accessed, is_deleted, deleted_at, \
                            encryption_algorithm";

/// Allow-listed sort keys. User input never reaches query construction as a
/// raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    UploadedAt,
    FileSize,
    EncryptedFilename,
}

impl SortBy {
    fn column(self) -> &'static str {
        match self {
            SortBy::UploadedAt => "uploaded_at",
            SortBy::FileSize => "file_size",
            SortBy::EncryptedFilename => "encrypted_filename",
        }
    }
}

impl FromStr for SortBy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uploaded_at" => Ok(SortBy::UploadedAt),
            "file_size" => Ok(SortBy::FileSize),
            "encrypted_filename" => Ok(SortBy::EncryptedFilename),
            _ => Err(AppError::Validation(
                "Invalid sort field. Must be one of: uploaded_at, file_size, encrypted_filename"
                    .to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(AppError::Validation(
                "Order must be 'asc' or 'desc'".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileStats {
    pub file_count: i64,
    pub largest_file: Option<LargestFile>,
}

/// Metadata table of uploaded objects. Every accessor is ownership-scoped:
/// `user_id` must match on reads, updates and deletes alike.
#[async_trait]
pub trait FileCatalog: Send + Sync {
    async fn insert(&self, record: &FileRecord) -> Result<()>;

    /// Live (non-deleted) rows only, offset-paginated. Returns the page and
    /// the total count under the same filter.
    async fn list(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
        sort_by: SortBy,
        order: SortOrder,
    ) -> Result<(Vec<FileRecord>, i64)>;

    /// Live rows only; refreshes `last_accessed` on hit.
    async fn get(&self, user_id: Uuid, file_id: Uuid) -> Result<Option<FileRecord>>;

    /// Includes soft-deleted rows; used by the delete path to decide between
    /// soft and hard semantics.
    async fn get_any(&self, user_id: Uuid, file_id: Uuid) -> Result<Option<FileRecord>>;

    /// Marks the row deleted. Returns false when no owned row exists.
    async fn soft_delete(&self, user_id: Uuid, file_id: Uuid) -> Result<bool>;

    /// Removes the row regardless of soft-delete state.
    async fn hard_delete(&self, user_id: Uuid, file_id: Uuid) -> Result<bool>;

    /// Aggregates over live rows for the profile endpoints.
    async fn stats(&self, user_id: Uuid) -> Result<FileStats>;

    /// Backend connectivity probe for readiness checks.
    async fn ping(&self) -> Result<()>;
}

pub struct PgFileCatalog {
    pool: PgPool,
}

impl PgFileCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileCatalog for PgFileCatalog {
    async fn insert(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO files (id, user_id, encrypted_filename, encrypted_metadata, \
             file_size, storage_path, uploaded_at, is_deleted, encryption_algorithm) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.encrypted_filename)
        .bind(&record.encrypted_metadata)
        .bind(record.file_size)
        .bind(&record.storage_path)
        .bind(record.uploaded_at)
        .bind(record.is_deleted)
        .bind(&record.encryption_algorithm)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation => {
                AppError::Conflict("File id already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(())
    }

    async fn list(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
        sort_by: SortBy,
        order: SortOrder,
    ) -> Result<(Vec<FileRecord>, i64)> {
        let offset = (page as i64 - 1) * limit as i64;

        let query = format!(
            "SELECT {} FROM files WHERE user_id = $1 AND is_deleted = FALSE \
             ORDER BY {} {} LIMIT $2 OFFSET $3",
            FILE_COLUMNS,
            sort_by.column(),
            order.sql()
        );

        let files = sqlx::query_as::<_, FileRecord>(&query)
            .bind(user_id)
            .bind(limit as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files WHERE user_id = $1 AND is_deleted = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((files, total))
    }

    async fn get(&self, user_id: Uuid, file_id: Uuid) -> Result<Option<FileRecord>> {
        let query = format!(
            "UPDATE files SET last_accessed = NOW() \
             WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE RETURNING {}",
            FILE_COLUMNS
        );

        let record = sqlx::query_as::<_, FileRecord>(&query)
            .bind(file_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn get_any(&self, user_id: Uuid, file_id: Uuid) -> Result<Option<FileRecord>> {
        let query = format!(
            "SELECT {} FROM files WHERE id = $1 AND user_id = $2",
            FILE_COLUMNS
        );

        let record = sqlx::query_as::<_, FileRecord>(&query)
            .bind(file_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn soft_delete(&self, user_id: Uuid, file_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE files SET is_deleted = TRUE, deleted_at = NOW() \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(file_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn hard_delete(&self, user_id: Uuid, file_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1 AND user_id = $2")
            .bind(file_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self, user_id: Uuid) -> Result<FileStats> {
        let file_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files WHERE user_id = $1 AND is_deleted = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let largest_file = sqlx::query_as::<_, (Uuid, String, i64)>(
            "SELECT id, encrypted_filename, file_size FROM files \
             WHERE user_id = $1 AND is_deleted = FALSE \
             ORDER BY file_size DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|(id, encrypted_filename, size)| LargestFile {
            id,
            encrypted_filename,
            size,
        });

        Ok(FileStats {
            file_count,
            largest_file,
        })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

/// In-memory catalog for the test suites.
pub struct MemoryFileCatalog {
    files: Arc<Mutex<HashMap<Uuid, FileRecord>>>,
}

impl MemoryFileCatalog {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for MemoryFileCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileCatalog for MemoryFileCatalog {
    async fn insert(&self, record: &FileRecord) -> Result<()> {
        let mut files = self.files.lock().await;
        if files.contains_key(&record.id) {
            return Err(AppError::Conflict("File id already exists".to_string()));
        }
        files.insert(record.id, record.clone());
        Ok(())
    }

    async fn list(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
        sort_by: SortBy,
        order: SortOrder,
    ) -> Result<(Vec<FileRecord>, i64)> {
        let files = self.files.lock().await;

        let mut live: Vec<FileRecord> = files
            .values()
            .filter(|f| f.user_id == user_id && !f.is_deleted)
            .cloned()
            .collect();

        live.sort_by(|a, b| {
            let ordering = match sort_by {
                SortBy::UploadedAt => a.uploaded_at.cmp(&b.uploaded_at),
                SortBy::FileSize => a.file_size.cmp(&b.file_size),
                SortBy::EncryptedFilename => a.encrypted_filename.cmp(&b.encrypted_filename),
            };
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = live.len() as i64;
        // Widen before multiplying; page * limit can exceed u32.
        let offset = ((page as u64 - 1) * limit as u64) as usize;
        let items = live
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        Ok((items, total))
    }

    async fn get(&self, user_id: Uuid, file_id: Uuid) -> Result<Option<FileRecord>> {
        let mut files = self.files.lock().await;
        match files.get_mut(&file_id) {
            Some(record) if record.user_id == user_id && !record.is_deleted => {
                record.last_accessed = Some(Utc::now());
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_any(&self, user_id: Uuid, file_id: Uuid) -> Result<Option<FileRecord>> {
        let files = self.files.lock().await;
        Ok(files
            .get(&file_id)
            .filter(|record| record.user_id == user_id)
            .cloned())
    }

    async fn soft_delete(&self, user_id: Uuid, file_id: Uuid) -> Result<bool> {
        let mut files = self.files.lock().await;
        match files.get_mut(&file_id) {
            Some(record) if record.user_id == user_id => {
                record.is_deleted = true;
                record.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn hard_delete(&self, user_id: Uuid, file_id: Uuid) -> Result<bool> {
        let mut files = self.files.lock().await;
        match files.get(&file_id) {
            Some(record) if record.user_id == user_id => {
                files.remove(&file_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stats(&self, user_id: Uuid) -> Result<FileStats> {
        let files = self.files.lock().await;

        let live: Vec<&FileRecord> = files
            .values()
            .filter(|f| f.user_id == user_id && !f.is_deleted)
            .collect();

        let largest_file = live
            .iter()
            .max_by_key(|f| f.file_size)
            .map(|f| LargestFile {
                id: f.id,
                encrypted_filename: f.encrypted_filename.clone(),
                size: f.file_size,
            });

        Ok(FileStats {
            file_count: live.len() as i64,
            largest_file,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
