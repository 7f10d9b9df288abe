use axum::{extract::State, response::Json};
use serde_json::json;

use crate::{
    auth::PasswordService,
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{PasswordChangeRequest, StorageStats, UserProfile},
    services::UserStore,
};

fn percentage(used: i64, limit: i64) -> f64 {
    if limit <= 0 {
        return 0.0;
    }
    ((used as f64 / limit as f64) * 10_000.0).round() / 100.0
}

pub async fn profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>> {
    let account = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    let stats = state.files.stats(user.id).await?;

    let profile = UserProfile {
        id: account.id,
        email: account.email,
        created_at: account.created_at,
        storage_used: account.storage_used,
        storage_limit: account.storage_limit,
        storage_percentage: percentage(account.storage_used, account.storage_limit),
        total_files: stats.file_count,
        last_login: account.last_login,
    };

    Ok(Json(json!({ "data": profile })))
}

pub async fn storage(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>> {
    let usage = state.files.usage(user.id).await?;
    let stats = state.files.stats(user.id).await?;

    let response = StorageStats {
        used: usage.used,
        limit: usage.limit,
        available: (usage.limit - usage.used).max(0),
        percentage: percentage(usage.used, usage.limit),
        file_count: stats.file_count,
        largest_file: stats.largest_file,
    };

    Ok(Json(json!({ "data": response })))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<PasswordChangeRequest>,
) -> Result<Json<serde_json::Value>> {
    let account = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !PasswordService::verify_credential(
        &request.old_password_hash,
        &account.salt,
        &account.password_hash,
    )? {
        return Err(AppError::Auth("Current password is incorrect".to_string()));
    }

    PasswordService::validate_client_hash(&request.new_password_hash)?;
    PasswordService::validate_salt(&request.new_salt)?;

    let stored_hash =
        PasswordService::hash_credential(&request.new_password_hash, &request.new_salt)?;
    state
        .users
        .update_credentials(user.id, &stored_hash, &request.new_salt)
        .await?;

    tracing::info!("Password changed for user: {}", user.id);

    Ok(Json(json!({
        "message": "Password updated successfully"
    })))
}
