use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use heartline_shared::errors::{AppError, AppResult, ErrorCode};
use heartline_shared::types::{AccessToken, ApiResponse};

use crate::routes::JsonBody;
use crate::services::accounts;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AccessToken>>)> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let token = accounts::register(&state, &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(token))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AppResult<Json<ApiResponse<AccessToken>>> {
    let token = accounts::login(&state, &req.email, &req.password).await?;
    Ok(Json(ApiResponse::ok(token)))
}
