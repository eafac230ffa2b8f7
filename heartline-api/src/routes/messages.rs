use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use heartline_shared::errors::AppResult;
use heartline_shared::types::{ApiResponse, AuthUser};

use crate::models::Message;
use crate::routes::{JsonBody, PathParam};
use crate::services::conversation;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(alias = "recipientId")]
    pub recipient_id: Uuid,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub user_name: String,
    pub messages: Vec<Message>,
}

pub async fn send(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Message>>)> {
    let message = conversation::send(&state, &auth, req.recipient_id, req.content).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(message))))
}

/// GET /messages/conversation/:user_id
pub async fn conversation(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    PathParam(other): PathParam<Uuid>,
) -> AppResult<Json<ApiResponse<ConversationResponse>>> {
    let (user_name, messages) = conversation::history(&state, &auth, other).await?;
    Ok(Json(ApiResponse::ok(ConversationResponse { user_name, messages })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::domain::graph::{PairAction, PairKey};
    use crate::test_support::{call, TestApp};

    #[tokio::test]
    async fn matched_users_exchange_messages() {
        let app = TestApp::new();
        let ana = app.user("auth0|ana").await;
        let bob = app.user("auth0|bob").await;
        let key = PairKey::new(ana.id, bob.id).unwrap();
        app.store().apply_pair_action(key, PairAction::Like { actor: ana.id }).await.unwrap();
        app.store().apply_pair_action(key, PairAction::Like { actor: bob.id }).await.unwrap();

        let ana_token = app.token("auth0|ana");
        let body = json!({ "recipientId": bob.id, "content": "hi bob" });
        let (status, sent) = call(&app, "POST", "/messages/send", Some(&ana_token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent["data"]["room_id"], key.room_id());

        let bob_token = app.token("auth0|bob");
        let uri = format!("/messages/conversation/{}", ana.id);
        let (status, convo) = call(&app, "GET", &uri, Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(convo["data"]["user_name"], "Unknown");
        assert_eq!(convo["data"]["messages"][0]["content"], "hi bob");

        let (_, matches) = call(&app, "GET", "/user/matches", Some(&bob_token), None).await;
        assert_eq!(matches["data"][0]["last_message"], "hi bob");
    }

    #[tokio::test]
    async fn strangers_are_forbidden() {
        let app = TestApp::new();
        app.user("auth0|ana").await;
        let bob = app.user("auth0|bob").await;
        let token = app.token("auth0|ana");

        let body = json!({ "recipient_id": bob.id, "content": "hello?" });
        let (status, resp) = call(&app, "POST", "/messages/send", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(resp["error"]["code"], "E4001");

        let uri = format!("/messages/conversation/{}", bob.id);
        let (status, _) = call(&app, "GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
