use chrono::Utc;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    models::{
        DeleteResponse, DownloadResponse, FileListResult, FileRecord, FileResponse, Pagination,
        UploadRequest,
    },
    services::{
        catalog::{FileStats, SortBy, SortOrder},
        quota::QuotaUsage,
        FileCatalog, QuotaLedger,
    },
    storage::{object_path, ObjectStore},
};

pub const ENCRYPTION_ALGORITHM: &str = "AES-256-GCM";

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// Orchestrates uploads, reads and deletes across the catalog, the quota
/// ledger and the object store. The two backends share no transaction, so
/// consistency comes from step ordering plus compensating actions on
/// partial failure.
#[derive(Clone)]
pub struct FileService {
    catalog: Arc<dyn FileCatalog>,
    ledger: Arc<dyn QuotaLedger>,
    store: Arc<dyn ObjectStore>,
    max_file_size_mb: u64,
    signed_url_ttl_secs: u64,
    op_timeout: Duration,
}

impl FileService {
    pub fn new(
        catalog: Arc<dyn FileCatalog>,
        ledger: Arc<dyn QuotaLedger>,
        store: Arc<dyn ObjectStore>,
        max_file_size_mb: u64,
        signed_url_ttl_secs: u64,
        op_timeout_secs: u64,
    ) -> Self {
        Self {
            catalog,
            ledger,
            store,
            max_file_size_mb,
            signed_url_ttl_secs,
            op_timeout: Duration::from_secs(op_timeout_secs),
        }
    }

    fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Upload sequence: validate -> quota pre-check -> object put -> catalog
    /// insert -> quota reserve. Reservation comes last so a failed insert
    /// never leaves quota consumed, and a successful row is always followed
    /// by its reservation (or rolled back).
    pub async fn upload(
        &self,
        user_id: Uuid,
        request: UploadRequest,
        bytes: Vec<u8>,
        content_type: String,
    ) -> Result<FileRecord> {
        if request.encrypted_filename.trim().is_empty() {
            return Err(AppError::Validation(
                "Encrypted filename is required".to_string(),
            ));
        }
        if request.file_size <= 0 {
            return Err(AppError::Validation(
                "Declared file size must be a positive number of bytes".to_string(),
            ));
        }
        if request.file_size as u64 > self.max_file_size_bytes() {
            return Err(AppError::FileTooLarge(self.max_file_size_mb));
        }
        if bytes.is_empty() {
            return Err(AppError::Validation("File data is empty".to_string()));
        }
        if bytes.len() as u64 > self.max_file_size_bytes() {
            return Err(AppError::FileTooLarge(self.max_file_size_mb));
        }

        // Fast rejection before any bytes move. The authoritative check
        // happens at reservation time.
        if !self.bounded(self.ledger.check(user_id, request.file_size)).await? {
            return Err(AppError::QuotaExceeded);
        }

        // The mutating sequence runs on its own task: once started it is not
        // interruptible by the caller dropping the request.
        let service = self.clone();
        tokio::spawn(async move { service.run_upload(user_id, request, bytes, content_type).await })
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("upload task failed: {}", e)))?
    }

    async fn run_upload(
        &self,
        user_id: Uuid,
        request: UploadRequest,
        bytes: Vec<u8>,
        content_type: String,
    ) -> Result<FileRecord> {
        let file_id = Uuid::new_v4();
        let storage_path = object_path(user_id, file_id);

        self.bounded(self.store.put(&storage_path, &bytes, &content_type))
            .await?;

        let record = FileRecord {
            id: file_id,
            user_id,
            encrypted_filename: request.encrypted_filename,
            encrypted_metadata: serde_json::to_value(&request.encrypted_metadata)
                .map_err(|e| AppError::Validation(format!("Invalid metadata: {}", e)))?,
            file_size: request.file_size,
            storage_path: storage_path.clone(),
            uploaded_at: Utc::now(),
            last_accessed: None,
            is_deleted: false,
            deleted_at: None,
            encryption_algorithm: ENCRYPTION_ALGORITHM.to_string(),
        };

        if let Err(e) = self.bounded(self.catalog.insert(&record)).await {
            self.remove_orphan(&storage_path).await;
            return Err(e);
        }

        if let Err(e) = self.bounded(self.ledger.reserve(user_id, record.file_size)).await {
            // Reservation lost a concurrent race after the row landed; roll
            // back both sides so no row exists without accounted quota.
            match self.bounded(self.catalog.hard_delete(user_id, file_id)).await {
                Ok(_) => {}
                Err(del) => tracing::warn!(
                    "Failed to roll back catalog row {} after reservation failure: {}",
                    file_id,
                    del
                ),
            }
            self.remove_orphan(&storage_path).await;
            return Err(e);
        }

        tracing::info!("File uploaded: {} for user {}", file_id, user_id);
        Ok(record)
    }

    pub async fn list(&self, user_id: Uuid, params: &ListParams) -> Result<FileListResult> {
        let page = params.page.unwrap_or(1);
        let limit = params.limit.unwrap_or(20);

        if page < 1 {
            return Err(AppError::Validation(
                "Page must be a positive integer".to_string(),
            ));
        }
        if !(1..=100).contains(&limit) {
            return Err(AppError::Validation(
                "Limit must be between 1 and 100".to_string(),
            ));
        }
        let sort_by: SortBy = params.sort_by.as_deref().unwrap_or("uploaded_at").parse()?;
        let order: SortOrder = params.order.as_deref().unwrap_or("desc").parse()?;

        let (records, total) = self
            .bounded(self.catalog.list(user_id, page, limit, sort_by, order))
            .await?;
        let total_pages = (total + limit as i64 - 1) / limit as i64;

        Ok(FileListResult {
            files: records.into_iter().map(FileResponse::from).collect(),
            pagination: Pagination {
                total,
                page,
                limit,
                total_pages,
            },
        })
    }

    /// Ownership-scoped: a file owned by another user is indistinguishable
    /// from a nonexistent one.
    pub async fn get_metadata(&self, user_id: Uuid, file_id: &str) -> Result<FileResponse> {
        let file_id = parse_file_id(file_id)?;

        let record = self
            .bounded(self.catalog.get(user_id, file_id))
            .await?
            .ok_or(AppError::NotFound)?;

        Ok(record.into())
    }

    pub async fn download_url(&self, user_id: Uuid, file_id: &str) -> Result<DownloadResponse> {
        let file_id = parse_file_id(file_id)?;

        let record = self
            .bounded(self.catalog.get(user_id, file_id))
            .await?
            .ok_or(AppError::NotFound)?;

        Ok(DownloadResponse {
            download_url: self
                .store
                .signed_url(&record.storage_path, self.signed_url_ttl_secs),
            expires_in: self.signed_url_ttl_secs,
        })
    }

    /// Soft delete hides the row and keeps it billed. Hard delete (explicit
    /// `permanent`, or deleting an already-soft-deleted row) removes the
    /// object, the row, and the quota charge, in that order: a stale catalog
    /// entry is worse than a leaked object.
    pub async fn delete(
        &self,
        user_id: Uuid,
        file_id: &str,
        permanent: bool,
    ) -> Result<DeleteResponse> {
        let file_id = parse_file_id(file_id)?;

        let record = self
            .bounded(self.catalog.get_any(user_id, file_id))
            .await?
            .ok_or(AppError::NotFound)?;

        if permanent || record.is_deleted {
            let service = self.clone();
            tokio::spawn(async move { service.run_hard_delete(record).await })
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("delete task failed: {}", e)))?
        } else {
            if !self.bounded(self.catalog.soft_delete(user_id, file_id)).await? {
                return Err(AppError::NotFound);
            }
            tracing::info!("File soft deleted: {}", file_id);
            Ok(DeleteResponse {
                file_id,
                deleted_at: Utc::now(),
            })
        }
    }

    async fn run_hard_delete(&self, record: FileRecord) -> Result<DeleteResponse> {
        // Best effort: a leaked object is recoverable offline, a dangling
        // catalog row is user-visible forever.
        self.remove_orphan(&record.storage_path).await;

        if !self
            .bounded(self.catalog.hard_delete(record.user_id, record.id))
            .await?
        {
            // Lost a race with a concurrent delete; that path released quota.
            return Err(AppError::NotFound);
        }

        if let Err(e) = self
            .bounded(self.ledger.release(record.user_id, record.file_size))
            .await
        {
            tracing::warn!(
                "Failed to release {} bytes for user {} after deleting {}: {}",
                record.file_size,
                record.user_id,
                record.id,
                e
            );
        }

        tracing::info!("File permanently deleted: {}", record.id);
        Ok(DeleteResponse {
            file_id: record.id,
            deleted_at: Utc::now(),
        })
    }

    pub async fn usage(&self, user_id: Uuid) -> Result<QuotaUsage> {
        self.bounded(self.ledger.usage(user_id)).await
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<FileStats> {
        self.bounded(self.catalog.stats(user_id)).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.bounded(self.catalog.ping()).await
    }

    /// Compensation: drop an object the catalog no longer (or never did)
    /// reference. Failure is logged for offline reconciliation, never
    /// surfaced.
    async fn remove_orphan(&self, path: &str) {
        if let Err(e) = self.bounded(self.store.delete(path)).await {
            tracing::warn!("Failed to remove orphaned object {}: {}", path, e);
        }
    }

    /// Every backend call is bounded; expiry surfaces as a backend error
    /// rather than hanging a request. No retry here, that belongs to callers.
    async fn bounded<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Storage(
                "Backend operation timed out".to_string(),
            )),
        }
    }
}

fn parse_file_id(file_id: &str) -> Result<Uuid> {
    Uuid::parse_str(file_id)
        .map_err(|_| AppError::Validation("Invalid file ID format".to_string()))
}
