use std::collections::HashMap;

use uuid::Uuid;

use heartline_shared::errors::{AppError, AppResult, ErrorCode};
use heartline_shared::types::AuthUser;

use crate::domain::conversation;
use crate::domain::graph::{LikeOutcome, PairAction, PairKey, Relationships};
use crate::models::{LikeSummary, MatchSummary, User};
use crate::services::identity;
use crate::AppState;

pub async fn like(state: &AppState, auth: &AuthUser, target: Uuid) -> AppResult<LikeOutcome> {
    let user = identity::resolve(state, auth).await?;
    act(state, &user, target, PairAction::Like { actor: user.id }).await
}

/// Accept a pending like from `liker`.
pub async fn accept(state: &AppState, auth: &AuthUser, liker: Uuid) -> AppResult<LikeOutcome> {
    let user = identity::resolve(state, auth).await?;
    act(state, &user, liker, PairAction::Accept { actor: user.id }).await
}

async fn act(state: &AppState, user: &User, other: Uuid, action: PairAction) -> AppResult<LikeOutcome> {
    let key = PairKey::new(user.id, other)?;
    if state.store.user(other).await?.is_none() {
        return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
    }

    let transition = state.store.apply_pair_action(key, action).await?;
    if let PairAction::Like { .. } = action {
        metrics::counter!("likes_total").increment(1);
    }

    if transition.created_match() {
        metrics::counter!("matches_total").increment(1);
        tracing::info!(user_id = %user.id, other_id = %other, room_id = %key.room_id(), "match created");
    } else {
        tracing::info!(user_id = %user.id, other_id = %other, "like sent");
    }

    Ok(transition.outcome())
}

pub async fn relationships(state: &AppState, user: Uuid) -> AppResult<Relationships> {
    let edges = state.store.edges(user).await?;
    Ok(Relationships::from_edges(user, edges))
}

/// Users waiting on the caller's answer, oldest like first.
pub async fn likes_received(state: &AppState, auth: &AuthUser) -> AppResult<Vec<LikeSummary>> {
    let user = identity::resolve(state, auth).await?;
    let rel = relationships(state, user.id).await?;
    let users = load_in_order(state, &rel.likes_received).await?;
    Ok(users.iter().map(LikeSummary::from).collect())
}

pub async fn likes_sent(state: &AppState, auth: &AuthUser) -> AppResult<Vec<Uuid>> {
    let user = identity::resolve(state, auth).await?;
    Ok(relationships(state, user.id).await?.likes_sent)
}

/// Matches with their latest message preview; most recent conversation
/// first, silent matches last in the order they were formed.
pub async fn matches(state: &AppState, auth: &AuthUser) -> AppResult<Vec<MatchSummary>> {
    let user = identity::resolve(state, auth).await?;
    let rel = relationships(state, user.id).await?;
    let others = load_in_order(state, &rel.matches).await?;

    let rooms: Vec<String> = others
        .iter()
        .filter_map(|o| PairKey::new(user.id, o.id).ok())
        .map(|k| k.room_id())
        .collect();
    let latest: HashMap<String, _> = state
        .store
        .latest_messages(&rooms)
        .await?
        .into_iter()
        .map(|m| (m.room_id.clone(), m))
        .collect();

    let preview_chars = state.config.preview_chars;
    let mut summaries: Vec<MatchSummary> = others
        .iter()
        .zip(rooms)
        .map(|(other, room_id)| {
            let last = latest.get(&room_id);
            MatchSummary {
                id: other.id,
                name: other.name.clone(),
                age: other.age,
                photos: other.photos.clone(),
                last_message: last.map(|m| conversation::preview(&m.content, preview_chars)),
                last_message_at: last.map(|m| m.created_at),
                room_id,
            }
        })
        .collect();

    conversation::order_matches(&mut summaries);
    Ok(summaries)
}

/// Load users keeping the order of `ids`; ids without a user are skipped.
async fn load_in_order(state: &AppState, ids: &[Uuid]) -> AppResult<Vec<User>> {
    let mut by_id: HashMap<Uuid, User> = state
        .store
        .users(ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::PairState;
    use crate::models::NewMessage;
    use crate::test_support::{auth, TestApp};

    #[tokio::test]
    async fn one_sided_like() {
        let app = TestApp::new();
        let a = app.user("auth0|a").await;
        let b = app.user("auth0|b").await;

        assert_eq!(like(&app.state, &auth("auth0|a"), b.id).await.unwrap(), LikeOutcome::Liked);

        assert_eq!(likes_sent(&app.state, &auth("auth0|a")).await.unwrap(), vec![b.id]);
        let received = likes_received(&app.state, &auth("auth0|b")).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id, a.id);
        assert!(matches(&app.state, &auth("auth0|a")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutual_like_becomes_match() {
        let app = TestApp::new();
        let a = app.user("auth0|a").await;
        let b = app.user("auth0|b").await;

        like(&app.state, &auth("auth0|a"), b.id).await.unwrap();
        assert_eq!(like(&app.state, &auth("auth0|b"), a.id).await.unwrap(), LikeOutcome::Matched);

        for (me, other) in [(&a, &b), (&b, &a)] {
            let rel = relationships(&app.state, me.id).await.unwrap();
            assert_eq!(rel.matches, vec![other.id]);
            assert!(rel.likes_sent.is_empty());
            assert!(rel.likes_received.is_empty());
        }
    }

    #[tokio::test]
    async fn duplicate_like_conflicts() {
        let app = TestApp::new();
        app.user("auth0|a").await;
        let b = app.user("auth0|b").await;

        like(&app.state, &auth("auth0|a"), b.id).await.unwrap();
        let err = like(&app.state, &auth("auth0|a"), b.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyLiked);
        assert_eq!(likes_sent(&app.state, &auth("auth0|a")).await.unwrap(), vec![b.id]);
    }

    #[tokio::test]
    async fn cannot_like_self() {
        let app = TestApp::new();
        let a = app.user("auth0|a").await;
        let err = like(&app.state, &auth("auth0|a"), a.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::CannotLikeSelf);
    }

    #[tokio::test]
    async fn like_unknown_user() {
        let app = TestApp::new();
        app.user("auth0|a").await;
        let err = like(&app.state, &auth("auth0|a"), Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserNotFound);
    }

    #[tokio::test]
    async fn explicit_accept() {
        let app = TestApp::new();
        let a = app.user("auth0|a").await;
        let b = app.user("auth0|b").await;

        let err = accept(&app.state, &auth("auth0|b"), a.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoPendingLike);

        like(&app.state, &auth("auth0|a"), b.id).await.unwrap();
        assert_eq!(accept(&app.state, &auth("auth0|b"), a.id).await.unwrap(), LikeOutcome::Matched);
        assert_eq!(
            app.store().pair_state(PairKey::new(a.id, b.id).unwrap()).await.unwrap(),
            PairState::Matched
        );

        let err = accept(&app.state, &auth("auth0|b"), a.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyMatched);
        let err = like(&app.state, &auth("auth0|a"), b.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyMatched);
    }

    #[tokio::test]
    async fn matches_sorted_by_latest_message() {
        let app = TestApp::new();
        let me = app.user("auth0|me").await;
        let silent = app.user("auth0|silent").await;
        let older = app.user("auth0|older").await;
        let newer = app.user("auth0|newer").await;

        for other in [&silent, &older, &newer] {
            let key = PairKey::new(me.id, other.id).unwrap();
            app.store().apply_pair_action(key, PairAction::Like { actor: other.id }).await.unwrap();
            app.store().apply_pair_action(key, PairAction::Like { actor: me.id }).await.unwrap();
        }

        let long = "x".repeat(60);
        for (other, content) in [(&older, "old news"), (&newer, long.as_str())] {
            app.store()
                .insert_message(NewMessage {
                    id: Uuid::now_v7(),
                    room_id: PairKey::new(me.id, other.id).unwrap().room_id(),
                    sender_id: other.id,
                    recipient_id: me.id,
                    content: content.to_string(),
                })
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let list = matches(&app.state, &auth("auth0|me")).await.unwrap();
        let order: Vec<Uuid> = list.iter().map(|m| m.id).collect();
        assert_eq!(order, vec![newer.id, older.id, silent.id]);
        assert_eq!(list[0].last_message.as_ref().unwrap().chars().count(), 40);
        assert_eq!(list[1].last_message.as_deref(), Some("old news"));
        assert!(list[2].last_message_at.is_none());
    }
}
