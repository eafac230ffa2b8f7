use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use heartline_shared::errors::{AppError, AppResult, ErrorCode};

use crate::domain::discovery;
use crate::domain::geo::GeoPoint;
use crate::domain::graph::{self, PairAction, PairEdge, PairKey, PairState, Relationships, Transition};
use crate::models::{Credential, Message, NewCredential, NewMessage, ProfileUpdate, User};
use crate::store::{DeletedUser, PhotoAppend, Store};

#[derive(Debug, Clone)]
struct PairRecord {
    state: PairState,
    since: DateTime<Utc>,
}

/// Process-local store. Each user record and each pair is updated under
/// its own map entry lock. A guard on one map is never held while taking
/// a guard on a map that is locked first elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    subjects: DashMap<String, Uuid>,
    pairs: DashMap<PairKey, PairRecord>,
    messages: RwLock<Vec<Message>>,
    seq: AtomicI64,
    credentials: DashMap<String, Credential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn relationships(&self, user: Uuid) -> Relationships {
        Relationships::from_edges(user, self.collect_edges(user))
    }

    fn collect_edges(&self, user: Uuid) -> Vec<PairEdge> {
        self.pairs
            .iter()
            .filter_map(|entry| {
                let other = entry.key().other(user)?;
                Some(PairEdge {
                    other,
                    state: entry.value().state,
                    since: entry.value().since,
                })
            })
            .collect()
    }

    fn mutate_user<T>(&self, id: Uuid, f: impl FnOnce(&mut User) -> T) -> Option<T> {
        self.users.get_mut(&id).map(|mut user| f(user.value_mut()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn provision_user(&self, subject: &str, email: Option<&str>) -> AppResult<(User, bool)> {
        match self.subjects.entry(subject.to_string()) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                drop(entry);
                let user = self
                    .users
                    .get(&id)
                    .map(|u| u.clone())
                    .ok_or_else(|| AppError::internal("user record missing for subject"))?;
                Ok((user, false))
            }
            Entry::Vacant(entry) => {
                let user = User::blank(subject, email.map(str::to_string));
                self.users.insert(user.id, user.clone());
                entry.insert(user.id);
                Ok((user, true))
            }
        }
    }

    async fn user_by_subject(&self, subject: &str) -> AppResult<Option<User>> {
        let Some(id) = self.subjects.get(subject).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn users(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.clone()))
            .collect())
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<Option<DeletedUser>> {
        let Some((_, user)) = self.users.remove(&id) else {
            return Ok(None);
        };
        self.subjects.remove(&user.subject);
        self.pairs.retain(|key, _| !key.contains(id));

        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| m.sender_id != id && m.recipient_id != id);
        let messages_removed = before - messages.len();

        Ok(Some(DeletedUser { user, messages_removed }))
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> AppResult<Option<User>> {
        Ok(self.mutate_user(id, |user| {
            user.apply(update);
            user.clone()
        }))
    }

    async fn set_position(&self, id: Uuid, position: GeoPoint, label: Option<&str>) -> AppResult<Option<User>> {
        Ok(self.mutate_user(id, |user| {
            user.latitude = Some(position.latitude);
            user.longitude = Some(position.longitude);
            if let Some(label) = label {
                user.location_label = Some(label.to_string());
            }
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn append_photos(&self, id: Uuid, refs: &[String], max: usize) -> AppResult<PhotoAppend> {
        let outcome = self.mutate_user(id, |user| {
            if user.photos.len() + refs.len() > max {
                return PhotoAppend::LimitExceeded { current: user.photos.len() };
            }
            user.photos.extend(refs.iter().cloned());
            user.updated_at = Utc::now();
            PhotoAppend::Appended(user.photos.clone())
        });
        Ok(outcome.unwrap_or(PhotoAppend::UserMissing))
    }

    async fn remove_photo(&self, id: Uuid, reference: &str) -> AppResult<Option<Vec<String>>> {
        let outcome = self.mutate_user(id, |user| {
            if !user.photos.iter().any(|p| p == reference) {
                return None;
            }
            user.photos.retain(|p| p != reference);
            user.updated_at = Utc::now();
            Some(user.photos.clone())
        });
        Ok(outcome.flatten())
    }

    async fn replace_photo_order(&self, id: Uuid, order: &[String]) -> AppResult<Option<Vec<String>>> {
        let outcome = self.mutate_user(id, |user| {
            let current: HashSet<&String> = user.photos.iter().collect();
            let proposed: HashSet<&String> = order.iter().collect();
            if order.len() != user.photos.len() || proposed.len() != order.len() || current != proposed {
                return None;
            }
            user.photos = order.to_vec();
            user.updated_at = Utc::now();
            Some(user.photos.clone())
        });
        Ok(outcome.flatten())
    }

    async fn pair_state(&self, key: PairKey) -> AppResult<PairState> {
        Ok(self
            .pairs
            .get(&key)
            .map(|r| r.state)
            .unwrap_or(PairState::None))
    }

    async fn apply_pair_action(&self, key: PairKey, action: PairAction) -> AppResult<Transition> {
        // The entry guard holds the pair's shard lock for the whole transition.
        // `delete_user` removes the user before purging pairs, so a like that
        // races it either sees the user gone here or is purged afterwards.
        let entry = self.pairs.entry(key);
        if !self.users.contains_key(&key.low()) || !self.users.contains_key(&key.high()) {
            return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
        }
        match entry {
            Entry::Occupied(mut entry) => {
                let from = entry.get().state;
                let to = graph::apply(&key, from, action)?;
                entry.insert(PairRecord { state: to, since: Utc::now() });
                Ok(Transition { from, to })
            }
            Entry::Vacant(entry) => {
                let from = PairState::None;
                let to = graph::apply(&key, from, action)?;
                if to != PairState::None {
                    entry.insert(PairRecord { state: to, since: Utc::now() });
                }
                Ok(Transition { from, to })
            }
        }
    }

    async fn edges(&self, user: Uuid) -> AppResult<Vec<PairEdge>> {
        Ok(self.collect_edges(user))
    }

    async fn nearest_candidates(&self, viewer: &User, origin: GeoPoint, limit: usize) -> AppResult<Vec<User>> {
        let excluded = self.relationships(viewer.id).excluded();

        let mut located: Vec<(f64, User)> = self
            .users
            .iter()
            .filter(|entry| discovery::is_eligible(viewer, entry.value(), &excluded))
            .filter_map(|entry| {
                let user = entry.value();
                let distance = origin.distance_km(&user.position()?);
                Some((distance, user.clone()))
            })
            .collect();

        located.sort_by(|a, b| a.0.total_cmp(&b.0));
        located.truncate(limit);
        Ok(located.into_iter().map(|(_, user)| user).collect())
    }

    async fn insert_message(&self, message: NewMessage) -> AppResult<Message> {
        let mut messages = self.messages.write().await;
        let saved = Message {
            id: message.id,
            seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
            room_id: message.room_id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            content: message.content,
            created_at: Utc::now(),
        };
        messages.push(saved.clone());
        Ok(saved)
    }

    async fn conversation(&self, room_id: &str) -> AppResult<Vec<Message>> {
        let messages = self.messages.read().await;
        let mut history: Vec<Message> = messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));
        Ok(history)
    }

    async fn latest_messages(&self, room_ids: &[String]) -> AppResult<Vec<Message>> {
        let messages = self.messages.read().await;
        let latest = room_ids
            .iter()
            .filter_map(|room| {
                messages
                    .iter()
                    .filter(|m| &m.room_id == room)
                    .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)))
                    .cloned()
            })
            .collect();
        Ok(latest)
    }

    async fn create_credential(&self, credential: NewCredential) -> AppResult<Option<Credential>> {
        match self.credentials.entry(credential.email.clone()) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(entry) => {
                let created = Credential {
                    id: credential.id,
                    email: credential.email,
                    password_hash: credential.password_hash,
                    subject: credential.subject,
                    created_at: Utc::now(),
                };
                entry.insert(created.clone());
                Ok(Some(created))
            }
        }
    }

    async fn credential_by_email(&self, email: &str) -> AppResult<Option<Credential>> {
        Ok(self.credentials.get(email).map(|c| c.clone()))
    }
}
