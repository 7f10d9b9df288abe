use bcrypt::{hash, verify, DEFAULT_COST};

use crate::errors::{AppError, Result};

/// Server-side hashing of the client's already-hashed credential. The client
/// derives `password_hash` from the plaintext locally; the server only ever
/// bcrypts that hash together with the client salt.
pub struct PasswordService;

impl PasswordService {
    pub fn hash_credential(client_hash: &str, salt: &str) -> Result<String> {
        hash(format!("{}{}", client_hash, salt), DEFAULT_COST)
            .map_err(|e| AppError::Auth(format!("Failed to hash credential: {}", e)))
    }

    pub fn verify_credential(client_hash: &str, salt: &str, stored_hash: &str) -> Result<bool> {
        verify(format!("{}{}", client_hash, salt), stored_hash)
            .map_err(|e| AppError::Auth(format!("Failed to verify credential: {}", e)))
    }

    /// The client hash is opaque but must look like a real digest.
    pub fn validate_client_hash(client_hash: &str) -> Result<()> {
        if client_hash.len() < 32 {
            return Err(AppError::Validation(
                "Password hash must be at least 32 characters".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_salt(salt: &str) -> Result<()> {
        if salt.len() < 16 {
            return Err(AppError::Validation(
                "Salt must be at least 16 characters".to_string(),
            ));
        }
        Ok(())
    }
}
