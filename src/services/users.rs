use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    models::User,
};

const USER_COLUMNS: &str = "id, email, password_hash, salt, storage_used, storage_limit, \
                            is_active, created_at, last_login";

/// Account storage. Quota counters live on the same rows but are mutated only
/// through the quota ledger.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        salt: &str,
        storage_limit: i64,
    ) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn touch_last_login(&self, id: Uuid) -> Result<()>;

    /// Replaces the stored credential hash and salt together; the pair must
    /// stay consistent for login verification.
    async fn update_credentials(&self, id: Uuid, password_hash: &str, salt: &str) -> Result<()>;

    /// Accounts are never physically removed, only deactivated.
    async fn deactivate(&self, id: Uuid) -> Result<()>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        salt: &str,
        storage_limit: i64,
    ) -> Result<User> {
        let query = format!(
            "INSERT INTO users (email, password_hash, salt, storage_limit) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .bind(password_hash)
            .bind(salt)
            .bind(storage_limit)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation => {
                    AppError::Conflict("Email already registered".to_string())
                }
                _ => AppError::Database(e),
            })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);

        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_credentials(&self, id: Uuid, password_hash: &str, salt: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, salt = $3 WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .bind(salt)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn deactivate(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

/// In-memory account table for the test suites. The map handle is shared with
/// [`crate::services::quota::MemoryQuotaLedger`] so both views stay consistent.
pub struct MemoryUserStore {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn users_handle(&self) -> Arc<Mutex<HashMap<Uuid, User>>> {
        self.users.clone()
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        salt: &str,
        storage_limit: i64,
    ) -> Result<User> {
        let mut users = self.users.lock().await;

        if users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            salt: salt.to_string(),
            storage_used: 0,
            storage_limit,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<()> {
        if let Some(user) = self.users.lock().await.get_mut(&id) {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_credentials(&self, id: Uuid, password_hash: &str, salt: &str) -> Result<()> {
        match self.users.lock().await.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.salt = salt.to_string();
                Ok(())
            }
            None => Err(AppError::NotFound),
        }
    }

    async fn deactivate(&self, id: Uuid) -> Result<()> {
        match self.users.lock().await.get_mut(&id) {
            Some(user) => {
                user.is_active = false;
                Ok(())
            }
            None => Err(AppError::NotFound),
        }
    }
}
