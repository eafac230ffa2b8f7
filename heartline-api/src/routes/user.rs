use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use heartline_shared::errors::AppResult;
use heartline_shared::types::{ApiResponse, AuthUser};

use crate::domain::geo::GeoPoint;
use crate::models::{ProfileUpdate, PublicProfile, User};
use crate::routes::{JsonBody, PathParam};
use crate::services::profile::LocationView;
use crate::services::{identity, profile};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub user: User,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub label: Option<String>,
}

/// POST /user/init - find or create the caller's user
pub async fn init(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<InitResponse>>> {
    let (user, created) = identity::provision(&state, &auth).await?;
    Ok(Json(ApiResponse::ok(InitResponse { user, created })))
}

pub async fn get_profile(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = identity::resolve(&state, &auth).await?;
    Ok(Json(ApiResponse::ok(user)))
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = profile::update_profile(&state, &auth, update).await?;
    Ok(Json(ApiResponse::ok_with_message(user, "Profile updated")))
}

pub async fn set_location(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LocationRequest>,
) -> AppResult<Json<ApiResponse<LocationView>>> {
    let position = GeoPoint::new(req.latitude, req.longitude)?;
    let view = profile::set_location(&state, &auth, position, req.label).await?;
    Ok(Json(ApiResponse::ok(view)))
}

pub async fn get_location(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<LocationView>>> {
    Ok(Json(ApiResponse::ok(profile::location(&state, &auth).await?)))
}

/// GET /user/:id - another user's public profile
pub async fn public_profile(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<PublicProfile>>> {
    let view = profile::public_profile(&state, &auth, id).await?;
    Ok(Json(ApiResponse::ok(view)))
}
