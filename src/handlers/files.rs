use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{EncryptedMetadata, FileResponse, UploadRequest},
    services::files::ListParams,
    storage::ObjectStore,
};

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart payload: {}", e))
}

pub async fn upload(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut content_type = "application/octet-stream".to_string();
    let mut encrypted_filename: Option<String> = None;
    let mut encrypted_metadata: Option<EncryptedMetadata> = None;
    let mut file_size: Option<i64> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                if let Some(ct) = field.content_type() {
                    content_type = ct.to_string();
                }
                file_bytes = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            }
            Some("encrypted_filename") => {
                encrypted_filename = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("encrypted_metadata") => {
                let raw = field.text().await.map_err(multipart_error)?;
                encrypted_metadata = Some(serde_json::from_str(&raw).map_err(|_| {
                    AppError::Validation("Invalid encrypted metadata".to_string())
                })?);
            }
            Some("file_size") => {
                let raw = field.text().await.map_err(multipart_error)?;
                file_size = Some(raw.parse().map_err(|_| {
                    AppError::Validation("File size must be an integer".to_string())
                })?);
            }
            _ => {}
        }
    }

    let request = UploadRequest {
        encrypted_filename: encrypted_filename
            .ok_or_else(|| AppError::Validation("Missing encrypted_filename field".to_string()))?,
        encrypted_metadata: encrypted_metadata
            .ok_or_else(|| AppError::Validation("Missing encrypted_metadata field".to_string()))?,
        file_size: file_size
            .ok_or_else(|| AppError::Validation("Missing file_size field".to_string()))?,
    };
    let bytes =
        file_bytes.ok_or_else(|| AppError::Validation("Missing file field".to_string()))?;

    let record = state.files.upload(user.id, request, bytes, content_type).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "File uploaded successfully",
            "data": FileResponse::from(record)
        })),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>> {
    let result = state.files.list(user.id, &params).await?;

    Ok(Json(json!({ "data": result })))
}

pub async fn metadata(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(file_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let file = state.files.get_metadata(user.id, &file_id).await?;

    Ok(Json(json!({ "data": file })))
}

pub async fn download(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(file_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let download = state.files.download_url(user.id, &file_id).await?;

    Ok(Json(json!({ "data": download })))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(file_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let result = state.files.delete(user.id, &file_id, false).await?;

    Ok(Json(json!({
        "message": "File deleted",
        "data": result
    })))
}

pub async fn delete_permanent(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(file_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let result = state.files.delete(user.id, &file_id, true).await?;

    Ok(Json(json!({
        "message": "File permanently deleted",
        "data": result
    })))
}

#[derive(Debug, Deserialize)]
pub struct SignedParams {
    pub expires: i64,
    pub signature: String,
}

/// Serves ciphertext for a presigned URL. No session auth: possession of a
/// valid, unexpired signature is the credential.
pub async fn serve_signed(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<SignedParams>,
) -> Result<Response> {
    if params.expires < Utc::now().timestamp() {
        return Err(AppError::Auth("Download link expired".to_string()));
    }
    if !state.signer.verify(&path, params.expires, &params.signature) {
        return Err(AppError::Auth("Invalid download signature".to_string()));
    }

    let bytes = state.store.get(&path).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}
