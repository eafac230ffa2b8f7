//! Like/match state per unordered pair of users.
//!
//! Each pair is in exactly one of `None`, `PendingFrom(initiator)` or
//! `Matched`. The per-user views (likes sent, likes received, matches) are
//! derived from these states rather than stored, so they cannot disagree.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use heartline_shared::errors::{AppError, ErrorCode};

/// Unordered pair of distinct users, stored sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    low: Uuid,
    high: Uuid,
}

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Result<Self, AppError> {
        if a == b {
            return Err(AppError::new(ErrorCode::CannotLikeSelf, "cannot like yourself"));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    pub fn contains(&self, user: Uuid) -> bool {
        self.low == user || self.high == user
    }

    pub fn other(&self, user: Uuid) -> Option<Uuid> {
        if user == self.low {
            Some(self.high)
        } else if user == self.high {
            Some(self.low)
        } else {
            None
        }
    }

    /// Channel identifier shared by both members: the two ids, sorted,
    /// joined with `_`. Hyphenated lowercase UUID text sorts the same as
    /// the bytes, so clients sorting the strings agree.
    pub fn room_id(&self) -> String {
        format!("{}_{}", self.low, self.high)
    }

    /// Inverse of [`PairKey::room_id`]. Only the canonical form parses.
    pub fn from_room_id(room: &str) -> Option<Self> {
        let (a, b) = room.split_once('_')?;
        let a = Uuid::parse_str(a).ok()?;
        let b = Uuid::parse_str(b).ok()?;
        let key = Self::new(a, b).ok()?;
        (key.room_id() == room).then_some(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "initiator", rename_all = "snake_case")]
pub enum PairState {
    None,
    PendingFrom(Uuid),
    Matched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairAction {
    /// `actor` likes the other member.
    Like { actor: Uuid },
    /// `actor` accepts a pending like from the other member.
    Accept { actor: Uuid },
}

impl PairAction {
    pub fn actor(&self) -> Uuid {
        match self {
            PairAction::Like { actor } | PairAction::Accept { actor } => *actor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PairState,
    pub to: PairState,
}

impl Transition {
    pub fn outcome(&self) -> LikeOutcome {
        if self.to == PairState::Matched {
            LikeOutcome::Matched
        } else {
            LikeOutcome::Liked
        }
    }

    pub fn created_match(&self) -> bool {
        self.from != PairState::Matched && self.to == PairState::Matched
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeOutcome {
    Liked,
    Matched,
}

impl LikeOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            LikeOutcome::Liked => "Like sent successfully",
            LikeOutcome::Matched => "It's a match!",
        }
    }
}

/// The state machine. `Matched` is terminal.
pub fn apply(key: &PairKey, state: PairState, action: PairAction) -> Result<PairState, AppError> {
    let actor = action.actor();
    if !key.contains(actor) {
        return Err(AppError::internal("actor is not a member of the pair"));
    }

    match (action, state) {
        (PairAction::Like { .. }, PairState::None) => Ok(PairState::PendingFrom(actor)),
        (PairAction::Like { .. }, PairState::PendingFrom(initiator)) if initiator == actor => {
            Err(AppError::new(ErrorCode::AlreadyLiked, "you already liked this user"))
        }
        (PairAction::Like { .. }, PairState::PendingFrom(_)) => Ok(PairState::Matched),
        (PairAction::Accept { .. }, PairState::PendingFrom(initiator)) if initiator != actor => {
            Ok(PairState::Matched)
        }
        (_, PairState::Matched) => {
            Err(AppError::new(ErrorCode::AlreadyMatched, "you are already matched with this user"))
        }
        (PairAction::Accept { .. }, _) => Err(AppError::new(
            ErrorCode::NoPendingLike,
            "this user has not liked you",
        )),
    }
}

/// One pair as seen from one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairEdge {
    pub other: Uuid,
    pub state: PairState,
    /// When the pair entered its current state.
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    pub likes_sent: Vec<Uuid>,
    pub likes_received: Vec<Uuid>,
    /// In match-formation order.
    pub matches: Vec<Uuid>,
}

impl Relationships {
    pub fn from_edges(user: Uuid, mut edges: Vec<PairEdge>) -> Self {
        edges.sort_by(|a, b| a.since.cmp(&b.since).then(a.other.cmp(&b.other)));

        let mut rel = Relationships::default();
        for edge in edges {
            match edge.state {
                PairState::PendingFrom(initiator) if initiator == user => rel.likes_sent.push(edge.other),
                PairState::PendingFrom(_) => rel.likes_received.push(edge.other),
                PairState::Matched => rel.matches.push(edge.other),
                PairState::None => {}
            }
        }
        rel
    }

    pub fn is_matched_with(&self, other: Uuid) -> bool {
        self.matches.contains(&other)
    }

    /// Everyone with any pair state toward the user.
    pub fn excluded(&self) -> HashSet<Uuid> {
        self.likes_sent
            .iter()
            .chain(&self.likes_received)
            .chain(&self.matches)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ids() -> (Uuid, Uuid) {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        (a, b)
    }

    #[test]
    fn key_is_order_independent() {
        let (a, b) = ids();
        assert_eq!(PairKey::new(a, b).unwrap(), PairKey::new(b, a).unwrap());
    }

    #[test]
    fn self_pair_is_rejected() {
        let a = Uuid::now_v7();
        assert_eq!(PairKey::new(a, a).unwrap_err().code(), ErrorCode::CannotLikeSelf);
    }

    #[test]
    fn room_id_matches_sorted_string_join() {
        let (a, b) = ids();
        let key = PairKey::new(b, a).unwrap();
        let mut parts = [a.to_string(), b.to_string()];
        parts.sort();
        assert_eq!(key.room_id(), parts.join("_"));
        assert_eq!(PairKey::from_room_id(&key.room_id()), Some(key));
    }

    #[test]
    fn non_canonical_room_ids_do_not_parse() {
        let (a, b) = ids();
        let key = PairKey::new(a, b).unwrap();
        let reversed = format!("{}_{}", key.high(), key.low());
        assert_eq!(PairKey::from_room_id(&reversed), None);
        assert_eq!(PairKey::from_room_id(&format!("{a}_{a}")), None);
        assert_eq!(PairKey::from_room_id("general"), None);
        assert_eq!(PairKey::from_room_id(&key.room_id().to_uppercase()), None);
    }

    #[test]
    fn like_from_none_is_pending() {
        let (a, b) = ids();
        let key = PairKey::new(a, b).unwrap();
        let next = apply(&key, PairState::None, PairAction::Like { actor: a }).unwrap();
        assert_eq!(next, PairState::PendingFrom(a));
    }

    #[test]
    fn repeated_like_conflicts() {
        let (a, b) = ids();
        let key = PairKey::new(a, b).unwrap();
        let err = apply(&key, PairState::PendingFrom(a), PairAction::Like { actor: a }).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyLiked);
    }

    #[test]
    fn mutual_like_matches() {
        let (a, b) = ids();
        let key = PairKey::new(a, b).unwrap();
        let next = apply(&key, PairState::PendingFrom(b), PairAction::Like { actor: a }).unwrap();
        assert_eq!(next, PairState::Matched);
    }

    #[test]
    fn matched_is_terminal() {
        let (a, b) = ids();
        let key = PairKey::new(a, b).unwrap();
        for action in [PairAction::Like { actor: a }, PairAction::Accept { actor: b }] {
            let err = apply(&key, PairState::Matched, action).unwrap_err();
            assert_eq!(err.code(), ErrorCode::AlreadyMatched);
        }
    }

    #[test]
    fn accept_requires_pending_like_from_other() {
        let (a, b) = ids();
        let key = PairKey::new(a, b).unwrap();

        assert_eq!(
            apply(&key, PairState::PendingFrom(a), PairAction::Accept { actor: b }).unwrap(),
            PairState::Matched
        );
        assert_eq!(
            apply(&key, PairState::None, PairAction::Accept { actor: b }).unwrap_err().code(),
            ErrorCode::NoPendingLike
        );
        // b cannot accept its own like
        assert_eq!(
            apply(&key, PairState::PendingFrom(b), PairAction::Accept { actor: b }).unwrap_err().code(),
            ErrorCode::NoPendingLike
        );
    }

    #[test]
    fn outsider_cannot_act_on_pair() {
        let (a, b) = ids();
        let key = PairKey::new(a, b).unwrap();
        let stranger = Uuid::now_v7();
        assert!(apply(&key, PairState::None, PairAction::Like { actor: stranger }).is_err());
    }

    #[test]
    fn transition_outcomes() {
        let (a, _) = ids();
        let liked = Transition { from: PairState::None, to: PairState::PendingFrom(a) };
        let matched = Transition { from: PairState::PendingFrom(a), to: PairState::Matched };
        assert_eq!(liked.outcome(), LikeOutcome::Liked);
        assert_eq!(matched.outcome(), LikeOutcome::Matched);
        assert!(matched.created_match());
        assert_eq!(matched.outcome().message(), "It's a match!");
    }

    #[test]
    fn relationships_partition_edges() {
        let me = Uuid::now_v7();
        let sent = Uuid::now_v7();
        let received = Uuid::now_v7();
        let first_match = Uuid::now_v7();
        let second_match = Uuid::now_v7();
        let t0 = Utc::now();

        let rel = Relationships::from_edges(
            me,
            vec![
                PairEdge { other: second_match, state: PairState::Matched, since: t0 + Duration::seconds(5) },
                PairEdge { other: sent, state: PairState::PendingFrom(me), since: t0 },
                PairEdge { other: received, state: PairState::PendingFrom(received), since: t0 },
                PairEdge { other: first_match, state: PairState::Matched, since: t0 + Duration::seconds(1) },
            ],
        );

        assert_eq!(rel.likes_sent, vec![sent]);
        assert_eq!(rel.likes_received, vec![received]);
        assert_eq!(rel.matches, vec![first_match, second_match]);
        assert!(rel.is_matched_with(first_match));
        assert!(!rel.is_matched_with(sent));
        assert_eq!(rel.excluded().len(), 4);
    }
}
