use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use heartline_shared::errors::AppResult;
use heartline_shared::types::{ApiResponse, AuthUser};

use crate::domain::graph::LikeOutcome;
use crate::models::{LikeSummary, MatchSummary};
use crate::routes::PathParam;
use crate::services::graph;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub outcome: LikeOutcome,
    pub message: &'static str,
}

impl From<LikeOutcome> for LikeResponse {
    fn from(outcome: LikeOutcome) -> Self {
        Self { outcome, message: outcome.message() }
    }
}

/// POST /user/like/:id
pub async fn like(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    PathParam(target): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<LikeResponse>>> {
    let outcome = graph::like(&state, &auth, target).await?;
    Ok(Json(ApiResponse::ok(outcome.into())))
}

/// POST /user/match/:id - accept a pending like from `id`
pub async fn accept(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    PathParam(liker): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<LikeResponse>>> {
    let outcome = graph::accept(&state, &auth, liker).await?;
    Ok(Json(ApiResponse::ok(outcome.into())))
}

pub async fn likes_received(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<LikeSummary>>>> {
    Ok(Json(ApiResponse::ok(graph::likes_received(&state, &auth).await?)))
}

pub async fn likes_sent(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Uuid>>>> {
    Ok(Json(ApiResponse::ok(graph::likes_sent(&state, &auth).await?)))
}

pub async fn matches(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<MatchSummary>>>> {
    Ok(Json(ApiResponse::ok(graph::matches(&state, &auth).await?)))
}
