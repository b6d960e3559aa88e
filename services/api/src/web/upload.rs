//! services/api/src/web/upload.rs
//!
//! Admin upload endpoint for product assets. Files land in the configured
//! upload directory under a generated name and are served back statically
//! at `/uploads/<name>`.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use storefront_core::domain::Role;

/// Extensions accepted for product assets: images plus 3D models.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "glb", "gltf"];

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub url: String,
}

/// Upload one product asset. Admin only.
///
/// Accepts a multipart/form-data request with a single file part.
#[utoipa::path(
    post,
    path = "/upload",
    request_body(content_type = "multipart/form-data", description = "The asset to upload."),
    responses(
        (status = 200, description = "Asset stored", body = UploadResponse),
        (status = 400, description = "Missing file or unsupported type"),
        (status = 401, description = "Not an admin"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if auth.role != Role::Admin {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
    }

    let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read multipart data: {}", e),
        )
    })?
    else {
        return Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()));
    };

    let original_name = field.file_name().unwrap_or_default().to_string();
    let extension = original_name
        .rsplit('.')
        .next()
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err((StatusCode::BAD_REQUEST, "Unsupported file type".to_string()));
    }

    let data: Bytes = field.bytes().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read file bytes: {}", e),
        )
    })?;

    let filename = format!("{}.{}", Uuid::new_v4(), extension);
    let upload_dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(upload_dir).await.map_err(|e| {
        error!("Failed to create upload directory: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store file".to_string(),
        )
    })?;
    tokio::fs::write(upload_dir.join(&filename), &data)
        .await
        .map_err(|e| {
            error!("Failed to write uploaded file: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store file".to_string(),
            )
        })?;

    Ok(Json(UploadResponse {
        url: format!("/uploads/{}", filename),
    }))
}
