use anyhow::Result;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expiration_minutes: i64,
    pub max_file_size_mb: u64,
    pub default_storage_limit_gb: u64,
    pub storage_dir: String,
    pub public_base_url: String,
    pub signed_url_ttl_secs: u64,
    pub url_signing_secret: String,
    pub storage_op_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/encrypted_storage".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()?,
            jwt_secret: env::var("JWT_SECRET_KEY")
                .unwrap_or_else(|_| "change-me".to_string()),
            jwt_expiration_minutes: env::var("JWT_EXPIRATION_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            max_file_size_mb: env::var("MAX_FILE_SIZE_MB")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            default_storage_limit_gb: env::var("DEFAULT_STORAGE_LIMIT_GB")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            storage_dir: env::var("STORAGE_DIR").unwrap_or_else(|_| "./storage".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            signed_url_ttl_secs: env::var("SIGNED_URL_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            url_signing_secret: env::var("URL_SIGNING_SECRET")
                .unwrap_or_else(|_| "change-me-too".to_string()),
            storage_op_timeout_secs: env::var("STORAGE_OP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        })
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn default_storage_limit_bytes(&self) -> i64 {
        (self.default_storage_limit_gb * 1024 * 1024 * 1024) as i64
    }
}
