use std::cmp::Ordering;

use uuid::Uuid;

use heartline_shared::errors::{AppError, ErrorCode};

use crate::domain::graph::PairKey;
use crate::models::MatchSummary;

pub const MAX_MESSAGE_CHARS: usize = 2000;

pub fn validate_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::new(ErrorCode::EmptyMessage, "message content is required"));
    }
    let chars = content.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(AppError::with_details(
            ErrorCode::MessageTooLong,
            format!("message exceeds {MAX_MESSAGE_CHARS} characters"),
            serde_json::json!({ "length": chars, "max": MAX_MESSAGE_CHARS }),
        ));
    }
    Ok(())
}

/// Parse a room id and check the caller is one of its two members. Whether
/// the pair is matched is the caller's job to check against the store.
pub fn authorize_room(user: Uuid, room: &str) -> Result<PairKey, AppError> {
    let key = PairKey::from_room_id(room)
        .ok_or_else(|| AppError::new(ErrorCode::InvalidRoom, "malformed room id"))?;
    if !key.contains(user) {
        return Err(AppError::new(ErrorCode::Forbidden, "not a member of this room"));
    }
    Ok(key)
}

/// First `max_chars` characters of a message, on char boundaries.
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => content[..idx].to_string(),
        None => content.to_string(),
    }
}

/// Most recent conversation first; matches without messages keep their
/// relative order after all others.
pub fn order_matches(matches: &mut [MatchSummary]) {
    matches.sort_by(|a, b| match (a.last_message_at, b.last_message_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn summary(id: Uuid, at: Option<chrono::DateTime<Utc>>) -> MatchSummary {
        MatchSummary {
            id,
            name: None,
            age: None,
            photos: vec![],
            room_id: String::new(),
            last_message: at.map(|_| "hi".to_string()),
            last_message_at: at,
        }
    }

    #[test]
    fn blank_content_is_rejected() {
        assert_eq!(validate_content("   \n").unwrap_err().code(), ErrorCode::EmptyMessage);
        assert_eq!(validate_content("").unwrap_err().code(), ErrorCode::EmptyMessage);
        assert!(validate_content("hey").is_ok());
    }

    #[test]
    fn length_is_counted_in_chars() {
        assert!(validate_content(&"é".repeat(MAX_MESSAGE_CHARS)).is_ok());
        let err = validate_content(&"a".repeat(MAX_MESSAGE_CHARS + 1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MessageTooLong);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 40), "short");
        let long = "ü".repeat(50);
        assert_eq!(preview(&long, 40).chars().count(), 40);
    }

    #[test]
    fn room_membership() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let room = PairKey::new(a, b).unwrap().room_id();

        assert!(authorize_room(a, &room).is_ok());
        assert_eq!(authorize_room(Uuid::now_v7(), &room).unwrap_err().code(), ErrorCode::Forbidden);
        assert_eq!(authorize_room(a, "lobby").unwrap_err().code(), ErrorCode::InvalidRoom);
    }

    #[test]
    fn matches_order_by_latest_message_then_silent() {
        let now = Utc::now();
        let (t1, t2) = (now, now - Duration::minutes(5));
        let silent_a = Uuid::now_v7();
        let older = Uuid::now_v7();
        let silent_b = Uuid::now_v7();
        let newer = Uuid::now_v7();

        let mut list = vec![
            summary(silent_a, None),
            summary(older, Some(t2)),
            summary(silent_b, None),
            summary(newer, Some(t1)),
        ];
        order_matches(&mut list);

        let order: Vec<Uuid> = list.iter().map(|m| m.id).collect();
        assert_eq!(order, vec![newer, older, silent_a, silent_b]);
    }
}
