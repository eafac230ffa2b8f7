use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use heartline_shared::errors::AppResult;
use heartline_shared::types::{ApiResponse, AuthUser};

use crate::domain::geo::GeoPoint;
use crate::models::Candidate;
use crate::routes::QueryParams;
use crate::services::discovery;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// GET /user/all?latitude=&longitude=
pub async fn feed(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    QueryParams(query): QueryParams<FeedQuery>,
) -> AppResult<Json<ApiResponse<Vec<Candidate>>>> {
    let requested = GeoPoint::from_parts(query.latitude, query.longitude)?;
    let candidates = discovery::feed(&state, &auth, requested).await?;
    Ok(Json(ApiResponse::ok(candidates)))
}
