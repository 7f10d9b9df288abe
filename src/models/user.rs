use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
    pub storage_used: i64,
    pub storage_limit: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    /// Client-side hashed password. The server never sees the plaintext.
    pub password_hash: String,
    /// Random salt generated by the client for key derivation.
    pub salt: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password_hash: String,
    pub new_password_hash: String,
    /// New client-side salt; rotated together with the hash.
    pub new_salt: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub storage_used: i64,
    pub storage_limit: i64,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            storage_used: user.storage_used,
            storage_limit: user.storage_limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub storage_used: i64,
    pub storage_limit: i64,
    pub storage_percentage: f64,
    pub total_files: i64,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StorageStats {
    pub used: i64,
    pub limit: i64,
    pub available: i64,
    pub percentage: f64,
    pub file_count: i64,
    pub largest_file: Option<LargestFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LargestFile {
    pub id: Uuid,
    pub encrypted_filename: String,
    pub size: i64,
}
