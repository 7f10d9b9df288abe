use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    models::User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaUsage {
    pub used: i64,
    pub limit: i64,
}

/// Per-user storage accounting. Reservation must be linearizable: two
/// concurrent `reserve` calls that jointly exceed the limit may not both
/// succeed, regardless of interleaving.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Atomically adds `delta` bytes to the user's usage, failing with
    /// `QuotaExceeded` when the result would exceed the limit. Returns the
    /// new usage. `delta` must be positive.
    async fn reserve(&self, user_id: Uuid, delta: i64) -> Result<i64>;

    /// Subtracts `delta` bytes, clamping at zero to tolerate accounting
    /// drift instead of going negative. Returns the new usage.
    async fn release(&self, user_id: Uuid, delta: i64) -> Result<i64>;

    /// Non-mutating pre-check used for early rejection before any bytes move.
    async fn check(&self, user_id: Uuid, delta: i64) -> Result<bool>;

    async fn usage(&self, user_id: Uuid) -> Result<QuotaUsage>;
}

fn validate_delta(delta: i64) -> Result<()> {
    if delta <= 0 {
        return Err(AppError::Validation(
            "Quota delta must be a positive number of bytes".to_string(),
        ));
    }
    Ok(())
}

pub struct PgQuotaLedger {
    pool: PgPool,
}

impl PgQuotaLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaLedger for PgQuotaLedger {
    async fn reserve(&self, user_id: Uuid, delta: i64) -> Result<i64> {
        validate_delta(delta)?;

        // Single conditional update: the ceiling check and the increment are
        // one statement, so concurrent reservations serialize on the row.
        let row = sqlx::query(
            "UPDATE users SET storage_used = storage_used + $2 \
             WHERE id = $1 AND is_active AND storage_used + $2 <= storage_limit \
             RETURNING storage_used",
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("storage_used")?),
            // Zero rows means either no such user or the ceiling was hit;
            // a follow-up read tells them apart.
            None => match self.usage(user_id).await {
                Ok(_) => Err(AppError::QuotaExceeded),
                Err(e) => Err(e),
            },
        }
    }

    async fn release(&self, user_id: Uuid, delta: i64) -> Result<i64> {
        validate_delta(delta)?;

        let row = sqlx::query(
            "UPDATE users SET storage_used = GREATEST(storage_used - $2, 0) \
             WHERE id = $1 RETURNING storage_used",
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("storage_used")?),
            None => Err(AppError::NotFound),
        }
    }

    async fn check(&self, user_id: Uuid, delta: i64) -> Result<bool> {
        validate_delta(delta)?;

        let usage = self.usage(user_id).await?;
        Ok(usage.used + delta <= usage.limit)
    }

    async fn usage(&self, user_id: Uuid) -> Result<QuotaUsage> {
        let row = sqlx::query(
            "SELECT storage_used, storage_limit FROM users WHERE id = $1 AND is_active",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)?;

        Ok(QuotaUsage {
            used: row.try_get("storage_used")?,
            limit: row.try_get("storage_limit")?,
        })
    }
}

/// In-memory ledger over the same user map as
/// [`crate::services::users::MemoryUserStore`]. The mutex spans the
/// check-and-increment, giving the same linearizability as the SQL version.
pub struct MemoryQuotaLedger {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

impl MemoryQuotaLedger {
    pub fn new(users: Arc<Mutex<HashMap<Uuid, User>>>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl QuotaLedger for MemoryQuotaLedger {
    async fn reserve(&self, user_id: Uuid, delta: i64) -> Result<i64> {
        validate_delta(delta)?;

        let mut users = self.users.lock().await;
        let user = users
            .get_mut(&user_id)
            .filter(|u| u.is_active)
            .ok_or(AppError::NotFound)?;

        if user.storage_used + delta > user.storage_limit {
            return Err(AppError::QuotaExceeded);
        }
        user.storage_used += delta;
        Ok(user.storage_used)
    }

    async fn release(&self, user_id: Uuid, delta: i64) -> Result<i64> {
        validate_delta(delta)?;

        let mut users = self.users.lock().await;
        let user = users.get_mut(&user_id).ok_or(AppError::NotFound)?;

        user.storage_used = (user.storage_used - delta).max(0);
        Ok(user.storage_used)
    }

    async fn check(&self, user_id: Uuid, delta: i64) -> Result<bool> {
        validate_delta(delta)?;

        let usage = self.usage(user_id).await?;
        Ok(usage.used + delta <= usage.limit)
    }

    async fn usage(&self, user_id: Uuid) -> Result<QuotaUsage> {
        let users = self.users.lock().await;
        let user = users
            .get(&user_id)
            .filter(|u| u.is_active)
            .ok_or(AppError::NotFound)?;

        Ok(QuotaUsage {
            used: user.storage_used,
            limit: user.storage_limit,
        })
    }
}
