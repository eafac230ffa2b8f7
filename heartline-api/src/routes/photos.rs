use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use heartline_shared::errors::{AppError, AppResult, ErrorCode};
use heartline_shared::types::{ApiResponse, AuthUser};

use crate::routes::JsonBody;
use crate::services::photos::{self, UploadedPhoto};
use crate::AppState;

pub const PHOTO_FIELD: &str = "photos";

#[derive(Debug, Serialize)]
pub struct PhotosResponse {
    pub photos: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePhotoRequest {
    pub photo: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub photos: Vec<String>,
}

/// POST /user/upload - multipart, one or more `photos` parts
pub async fn upload(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<PhotosResponse>>> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(multipart_error)?;
        files.push(UploadedPhoto { bytes: bytes.to_vec(), content_type });
    }

    let photos = photos::upload(&state, &auth, files).await?;
    Ok(Json(ApiResponse::ok_with_message(PhotosResponse { photos }, "Photos uploaded")))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(ErrorCode::PayloadTooLarge, "upload exceeds the size limit")
    } else {
        AppError::new(ErrorCode::PhotoUploadFailed, format!("failed to read multipart: {e}"))
    }
}

/// DELETE /user/photo - `{ photo }`
pub async fn delete_photo(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<DeletePhotoRequest>,
) -> AppResult<Json<ApiResponse<PhotosResponse>>> {
    let photos = photos::delete(&state, &auth, &req.photo).await?;
    Ok(Json(ApiResponse::ok(PhotosResponse { photos })))
}

/// PUT /user/photos/order - `{ photos: [...] }`
pub async fn reorder(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ReorderRequest>,
) -> AppResult<Json<ApiResponse<PhotosResponse>>> {
    let photos = photos::reorder(&state, &auth, req.photos).await?;
    Ok(Json(ApiResponse::ok(PhotosResponse { photos })))
}
