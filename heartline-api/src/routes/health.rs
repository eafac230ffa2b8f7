use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use heartline_shared::types::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let store = state.store.ping().await.map_err(|e| e.to_string());
    let mut checks = vec![HealthCheck::from_result("store", store)];
    if let Some(fanout) = &state.fanout_health {
        checks.push(HealthCheck::from_result("fanout", fanout.check().await));
    }
    let response = HealthResponse::healthy("heartline-api", env!("CARGO_PKG_VERSION")).with_checks(checks);

    let status = if response.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(response))
}
