use uuid::Uuid;

use heartline_shared::errors::{AppError, AppResult, ErrorCode};
use heartline_shared::types::AuthUser;

use crate::domain::conversation::validate_content;
use crate::domain::graph::{PairKey, PairState};
use crate::models::{Message, NewMessage, User};
use crate::services::identity;
use crate::AppState;

pub const UNKNOWN_USER_NAME: &str = "Unknown";

/// Persist a message between matched users, then hand it to fan-out.
pub async fn send(state: &AppState, auth: &AuthUser, recipient: Uuid, content: String) -> AppResult<Message> {
    validate_content(&content)?;
    let sender = identity::resolve(state, auth).await?;
    let key = matched_pair(state, &sender, recipient).await?;

    let message = state
        .store
        .insert_message(NewMessage {
            id: Uuid::now_v7(),
            room_id: key.room_id(),
            sender_id: sender.id,
            recipient_id: recipient,
            content,
        })
        .await?;

    metrics::counter!("messages_total").increment(1);
    tracing::info!(
        message_id = %message.id,
        room_id = %message.room_id,
        sender_id = %sender.id,
        "message stored"
    );

    if let Err(e) = state.fanout.publish(&message.room_id, &message).await {
        tracing::error!(room_id = %message.room_id, error = %e, "message fan-out failed");
    }

    Ok(message)
}

/// Full history with `other`, oldest first, plus their display name.
pub async fn history(state: &AppState, auth: &AuthUser, other: Uuid) -> AppResult<(String, Vec<Message>)> {
    let user = identity::resolve(state, auth).await?;
    let key = matched_pair(state, &user, other).await?;

    let messages = state.store.conversation(&key.room_id()).await?;
    let name = state
        .store
        .user(other)
        .await?
        .and_then(|u| u.name)
        .unwrap_or_else(|| UNKNOWN_USER_NAME.to_string());

    Ok((name, messages))
}

async fn matched_pair(state: &AppState, user: &User, other: Uuid) -> AppResult<PairKey> {
    let not_matched = || AppError::new(ErrorCode::NotMatched, "you can only message your matches");
    let key = PairKey::new(user.id, other).map_err(|_| not_matched())?;
    match state.store.pair_state(key).await? {
        PairState::Matched => Ok(key),
        _ => Err(not_matched()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::PairAction;
    use crate::models::ProfileUpdate;
    use crate::test_support::{auth, RecordingFanout, TestApp};

    async fn matched(app: &TestApp, a: &User, b: &User) {
        let key = PairKey::new(a.id, b.id).unwrap();
        app.store().apply_pair_action(key, PairAction::Like { actor: a.id }).await.unwrap();
        app.store().apply_pair_action(key, PairAction::Like { actor: b.id }).await.unwrap();
    }

    #[tokio::test]
    async fn unmatched_users_cannot_message() {
        let app = TestApp::new();
        let a = app.user("auth0|a").await;
        let b = app.user("auth0|b").await;
        app.store()
            .apply_pair_action(PairKey::new(a.id, b.id).unwrap(), PairAction::Like { actor: a.id })
            .await
            .unwrap();

        let err = send(&app.state, &auth("auth0|a"), b.id, "hi".into()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotMatched);
        let err = history(&app.state, &auth("auth0|a"), b.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotMatched);
        let err = send(&app.state, &auth("auth0|a"), a.id, "me".into()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotMatched);
        assert!(app.fanout.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn both_sides_see_history_in_order() {
        let app = TestApp::new();
        let a = app.user("auth0|a").await;
        let b = app.user("auth0|b").await;
        matched(&app, &a, &b).await;
        app.store()
            .update_profile(b.id, &ProfileUpdate { name: Some("Bea".into()), ..Default::default() })
            .await
            .unwrap();

        send(&app.state, &auth("auth0|a"), b.id, "hello".into()).await.unwrap();
        send(&app.state, &auth("auth0|b"), a.id, "hey you".into()).await.unwrap();
        send(&app.state, &auth("auth0|a"), b.id, "coffee?".into()).await.unwrap();

        let (name, from_a) = history(&app.state, &auth("auth0|a"), b.id).await.unwrap();
        let (other_name, from_b) = history(&app.state, &auth("auth0|b"), a.id).await.unwrap();
        assert_eq!(name, "Bea");
        assert_eq!(other_name, UNKNOWN_USER_NAME);
        assert_eq!(from_a, from_b);

        let contents: Vec<&str> = from_a.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hey you", "coffee?"]);
        assert!(from_a.windows(2).all(|w| w[0].seq < w[1].seq));

        let published = app.fanout.published.lock().unwrap();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0].0, PairKey::new(a.id, b.id).unwrap().room_id());
    }

    #[tokio::test]
    async fn content_is_validated_before_anything_else() {
        let app = TestApp::new();
        let a = app.user("auth0|a").await;
        let b = app.user("auth0|b").await;
        matched(&app, &a, &b).await;

        let err = send(&app.state, &auth("auth0|a"), b.id, "   ".into()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptyMessage);
        let err = send(&app.state, &auth("auth0|a"), b.id, "x".repeat(2001)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MessageTooLong);
        assert!(send(&app.state, &auth("auth0|a"), b.id, "x".repeat(2000)).await.is_ok());
    }

    #[tokio::test]
    async fn fanout_failure_does_not_lose_message() {
        let app = TestApp::with_fanout(RecordingFanout { fail: true, ..Default::default() });
        let a = app.user("auth0|a").await;
        let b = app.user("auth0|b").await;
        matched(&app, &a, &b).await;

        let sent = send(&app.state, &auth("auth0|a"), b.id, "still here".into()).await.unwrap();
        let (_, log) = history(&app.state, &auth("auth0|b"), a.id).await.unwrap();
        assert_eq!(log, vec![sent]);
    }
}
