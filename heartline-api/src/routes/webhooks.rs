use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use heartline_shared::errors::{AppError, AppResult, ErrorCode};
use heartline_shared::types::ApiResponse;

use crate::services::identity;
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "x-heartline-signature";
pub const TIMESTAMP_HEADER: &str = "x-heartline-timestamp";

#[derive(Debug, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: IdentityEventData,
}

#[derive(Debug, Deserialize)]
pub struct IdentityEventData {
    /// The subject as issued by the identity provider.
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub handled: bool,
}

/// POST /webhooks/identity - signed account lifecycle events
pub async fn identity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<WebhookAck>>> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    identity::verify_webhook(
        &state.config.webhook_secret,
        header(TIMESTAMP_HEADER),
        header(SIGNATURE_HEADER),
        &body,
        chrono::Utc::now().timestamp(),
        state.config.webhook_tolerance_secs,
    )?;

    let event: IdentityEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::new(ErrorCode::ValidationError, format!("malformed event: {e}")))?;

    match event.kind.as_str() {
        "user.deleted" => {
            identity::delete_account(&state, &event.data.id).await?;
            Ok(Json(ApiResponse::ok(WebhookAck { handled: true })))
        }
        other => {
            tracing::debug!(kind = %other, "ignoring identity event");
            Ok(Json(ApiResponse::ok(WebhookAck { handled: false })))
        }
    }
}
