use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::geo::GeoPoint;
use crate::domain::graph::{PairEdge, PairKey, PairState};
use crate::schema::{credentials, messages, pairs, users};

// --- User ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub orientation: Vec<String>,
    pub nationality: Option<String>,
    pub languages: Vec<String>,
    pub height: Option<i32>,
    pub bio: Option<String>,
    pub looking_for: Option<String>,
    pub location_label: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub photos: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A freshly provisioned user with every profile field empty.
    pub fn blank(subject: &str, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            subject: subject.to_string(),
            email,
            name: None,
            age: None,
            gender: None,
            orientation: Vec::new(),
            nationality: None,
            languages: Vec::new(),
            height: None,
            bio: None,
            looking_for: None,
            location_label: None,
            longitude: None,
            latitude: None,
            photos: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            _ => None,
        }
    }

    pub fn first_photo(&self) -> Option<String> {
        self.photos.first().cloned()
    }

    /// Apply a validated update in place. Mirrors the column-level update
    /// the Postgres store issues.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(v) = &update.name {
            self.name = Some(v.clone());
        }
        if let Some(v) = update.age {
            self.age = Some(v);
        }
        if let Some(v) = &update.gender {
            self.gender = Some(v.clone());
        }
        if let Some(v) = &update.orientation {
            self.orientation = v.clone();
        }
        if let Some(v) = &update.nationality {
            self.nationality = Some(v.clone());
        }
        if let Some(v) = &update.languages {
            self.languages = v.clone();
        }
        if let Some(v) = update.height {
            self.height = Some(v);
        }
        if let Some(v) = &update.bio {
            self.bio = Some(v.clone());
        }
        if let Some(v) = &update.looking_for {
            self.looking_for = Some(v.clone());
        }
        if let Some(v) = &update.location_label {
            self.location_label = Some(v.clone());
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: Uuid,
    pub subject: &'a str,
    pub email: Option<&'a str>,
}

/// Field-level profile update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, AsChangeset, Deserialize, Validate)]
#[diesel(table_name = users)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(range(min = 18, max = 120))]
    pub age: Option<i32>,
    #[validate(length(min = 1, max = 30))]
    pub gender: Option<String>,
    #[validate(length(max = 10))]
    pub orientation: Option<Vec<String>>,
    #[validate(length(min = 1, max = 60))]
    pub nationality: Option<String>,
    #[validate(length(max = 20))]
    pub languages: Option<Vec<String>>,
    #[validate(range(min = 100, max = 250))]
    pub height: Option<i32>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    #[serde(alias = "lookingFor")]
    #[validate(length(max = 100))]
    pub looking_for: Option<String>,
    #[serde(alias = "locationLabel", alias = "location")]
    #[validate(length(max = 120))]
    pub location_label: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.orientation.is_none()
            && self.nationality.is_none()
            && self.languages.is_none()
            && self.height.is_none()
            && self.bio.is_none()
            && self.looking_for.is_none()
            && self.location_label.is_none()
    }
}

// --- Pair ---

pub const PAIR_PENDING: &str = "pending";
pub const PAIR_MATCHED: &str = "matched";

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = pairs)]
pub struct PairRow {
    pub user_low: Uuid,
    pub user_high: Uuid,
    pub state: String,
    pub initiator: Uuid,
    pub created_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
}

impl PairRow {
    pub fn pair_state(&self) -> PairState {
        if self.state == PAIR_MATCHED {
            PairState::Matched
        } else {
            PairState::PendingFrom(self.initiator)
        }
    }

    /// The row as seen by `user`; `None` if they are not a member.
    pub fn edge_for(&self, user: Uuid) -> Option<PairEdge> {
        let key = PairKey::new(self.user_low, self.user_high).ok()?;
        Some(PairEdge {
            other: key.other(user)?,
            state: self.pair_state(),
            since: self.matched_at.unwrap_or(self.created_at),
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = pairs)]
pub struct NewPair {
    pub user_low: Uuid,
    pub user_high: Uuid,
    pub state: &'static str,
    pub initiator: Uuid,
    pub matched_at: Option<DateTime<Utc>>,
}

// --- Message ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize, PartialEq)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub seq: i64,
    pub room_id: String,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub id: Uuid,
    pub room_id: String,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
}

// --- Credential ---

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = credentials)]
pub struct Credential {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = credentials)]
pub struct NewCredential {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub subject: String,
}

// --- Views ---

/// Another user's profile as shown to the caller. Never carries the
/// subject, email or exact coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub orientation: Vec<String>,
    pub nationality: Option<String>,
    pub languages: Vec<String>,
    pub height: Option<i32>,
    pub bio: Option<String>,
    pub looking_for: Option<String>,
    pub location_label: Option<String>,
    pub photos: Vec<String>,
}

impl From<&User> for PublicProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            age: u.age,
            gender: u.gender.clone(),
            orientation: u.orientation.clone(),
            nationality: u.nationality.clone(),
            languages: u.languages.clone(),
            height: u.height,
            bio: u.bio.clone(),
            looking_for: u.looking_for.clone(),
            location_label: u.location_label.clone(),
            photos: u.photos.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub photo: Option<String>,
}

impl From<&User> for LikeSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            age: u.age,
            photo: u.first_photo(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub photos: Vec<String>,
    pub room_id: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}
