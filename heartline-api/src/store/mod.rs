//! Persistence behind one trait so the service runs against Postgres in
//! production and an in-process store in development and tests.

use async_trait::async_trait;
use uuid::Uuid;

use heartline_shared::errors::AppResult;

use crate::domain::geo::GeoPoint;
use crate::domain::graph::{PairAction, PairEdge, PairKey, PairState, Transition};
use crate::models::{Credential, Message, NewCredential, NewMessage, ProfileUpdate, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of the conditional photo append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoAppend {
    Appended(Vec<String>),
    LimitExceeded { current: usize },
    UserMissing,
}

#[derive(Debug, Clone)]
pub struct DeletedUser {
    pub user: User,
    pub messages_removed: usize,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    // --- Users ---

    /// Return the user for `subject`, creating an empty one if needed.
    /// The flag is true only for the call that created the row.
    async fn provision_user(&self, subject: &str, email: Option<&str>) -> AppResult<(User, bool)>;
    async fn user_by_subject(&self, subject: &str) -> AppResult<Option<User>>;
    async fn user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn users(&self, ids: &[Uuid]) -> AppResult<Vec<User>>;
    /// Remove the user together with their pair states and every message
    /// they sent or received.
    async fn delete_user(&self, id: Uuid) -> AppResult<Option<DeletedUser>>;
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> AppResult<Option<User>>;
    async fn set_position(&self, id: Uuid, position: GeoPoint, label: Option<&str>) -> AppResult<Option<User>>;

    // --- Photos ---

    /// Append `refs` only if the list stays within `max`. Check and write
    /// are one atomic step.
    async fn append_photos(&self, id: Uuid, refs: &[String], max: usize) -> AppResult<PhotoAppend>;
    /// `None` when the reference is not in the user's list.
    async fn remove_photo(&self, id: Uuid, reference: &str) -> AppResult<Option<Vec<String>>>;
    /// `None` when `order` is not a permutation of the stored list.
    async fn replace_photo_order(&self, id: Uuid, order: &[String]) -> AppResult<Option<Vec<String>>>;

    // --- Pairs ---

    async fn pair_state(&self, key: PairKey) -> AppResult<PairState>;
    /// Read, transition and write one pair while holding that pair's lock.
    async fn apply_pair_action(&self, key: PairKey, action: PairAction) -> AppResult<Transition>;
    async fn edges(&self, user: Uuid) -> AppResult<Vec<PairEdge>>;

    // --- Discovery ---

    /// Located users the viewer has no pair state with, orientation
    /// filtered, nearest to `origin` first.
    async fn nearest_candidates(&self, viewer: &User, origin: GeoPoint, limit: usize) -> AppResult<Vec<User>>;

    // --- Messages ---

    async fn insert_message(&self, message: NewMessage) -> AppResult<Message>;
    /// Whole history of a room, oldest first.
    async fn conversation(&self, room_id: &str) -> AppResult<Vec<Message>>;
    /// The newest message of each listed room that has one.
    async fn latest_messages(&self, room_ids: &[String]) -> AppResult<Vec<Message>>;

    // --- Local credentials ---

    /// `None` when the email is already registered.
    async fn create_credential(&self, credential: NewCredential) -> AppResult<Option<Credential>>;
    async fn credential_by_email(&self, email: &str) -> AppResult<Option<Credential>>;
}
