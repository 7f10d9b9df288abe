use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::PasswordService,
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{LoginRequest, RegisterRequest, UserSummary},
    services::UserStore,
};

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    if !request.email.contains('@') {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }
    // The hash and salt are client-derived; the server only checks shape.
    PasswordService::validate_client_hash(&request.password_hash)?;
    PasswordService::validate_salt(&request.salt)?;

    let stored_hash = PasswordService::hash_credential(&request.password_hash, &request.salt)?;

    let user = state
        .users
        .create(
            &request.email,
            &stored_hash,
            &request.salt,
            state.config.default_storage_limit_bytes(),
        )
        .await?;

    tracing::info!("User registered: {}", user.id);

    let access_token = state.jwt.generate_token(user.id, &user.email)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "data": {
                "access_token": access_token,
                "token_type": "bearer",
                "expires_in": state.jwt.expiry_seconds(),
                "user": UserSummary::from(&user)
            }
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>> {
    let user = state
        .users
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid credentials".to_string()))?;

    if !user.is_active {
        return Err(AppError::Auth("Account is deactivated".to_string()));
    }

    if !PasswordService::verify_credential(&request.password_hash, &user.salt, &user.password_hash)?
    {
        return Err(AppError::Auth("Invalid credentials".to_string()));
    }

    state.users.touch_last_login(user.id).await?;

    let access_token = state.jwt.generate_token(user.id, &user.email)?;

    Ok(Json(json!({
        "message": "Login successful",
        "data": {
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": state.jwt.expiry_seconds(),
            "user": UserSummary::from(&user)
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct SaltQuery {
    pub email: String,
}

/// Pre-login salt lookup so the client can derive its password hash before
/// it has any credentials.
pub async fn salt(
    State(state): State<AppState>,
    Query(query): Query<SaltQuery>,
) -> Result<Json<serde_json::Value>> {
    let user = state
        .users
        .find_by_email(&query.email)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(json!({
        "data": { "salt": user.salt }
    })))
}

pub async fn refresh(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>> {
    let access_token = state.jwt.generate_token(user.id, &user.email)?;

    Ok(Json(json!({
        "message": "Token refreshed successfully",
        "data": {
            "access_token": access_token,
            "expires_in": state.jwt.expiry_seconds()
        }
    })))
}

pub async fn verify(user: AuthenticatedUser) -> Json<serde_json::Value> {
    Json(json!({
        "data": {
            "valid": true,
            "user_id": user.id,
            "email": user.email
        }
    }))
}

/// Stateless JWT: logout is client-side token disposal. The endpoint exists
/// so clients have a uniform call to end a session.
pub async fn logout(user: AuthenticatedUser) -> Json<serde_json::Value> {
    tracing::info!("User logged out: {}", user.id);

    Json(json!({
        "message": "Logged out successfully"
    }))
}
