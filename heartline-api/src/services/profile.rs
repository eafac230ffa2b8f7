use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use heartline_shared::errors::{AppError, AppResult, ErrorCode};
use heartline_shared::types::AuthUser;

use crate::domain::geo::GeoPoint;
use crate::models::{ProfileUpdate, PublicProfile, User};
use crate::services::identity;
use crate::AppState;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocationView {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub label: Option<String>,
}

impl From<&User> for LocationView {
    fn from(u: &User) -> Self {
        Self {
            latitude: u.latitude,
            longitude: u.longitude,
            label: u.location_label.clone(),
        }
    }
}

pub async fn update_profile(state: &AppState, auth: &AuthUser, update: ProfileUpdate) -> AppResult<User> {
    let update = normalize(update);
    update
        .validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let user = identity::resolve(state, auth).await?;
    let updated = state
        .store
        .update_profile(user.id, &update)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    tracing::info!(user_id = %user.id, "profile updated");
    Ok(updated)
}

pub async fn public_profile(state: &AppState, auth: &AuthUser, id: Uuid) -> AppResult<PublicProfile> {
    identity::resolve(state, auth).await?;
    let user = state
        .store
        .user(id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;
    Ok(PublicProfile::from(&user))
}

pub async fn set_location(
    state: &AppState,
    auth: &AuthUser,
    position: GeoPoint,
    label: Option<String>,
) -> AppResult<LocationView> {
    let label = label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
    let user = identity::resolve(state, auth).await?;
    let updated = state
        .store
        .set_position(user.id, position, label.as_deref())
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    tracing::debug!(user_id = %user.id, "location updated");
    Ok(LocationView::from(&updated))
}

pub async fn location(state: &AppState, auth: &AuthUser) -> AppResult<LocationView> {
    let user = identity::resolve(state, auth).await?;
    Ok(LocationView::from(&user))
}

/// Lower-case gender and orientation, trim text, drop empty and duplicate
/// list entries while keeping first-seen order.
fn normalize(mut update: ProfileUpdate) -> ProfileUpdate {
    update.gender = update.gender.map(|g| g.trim().to_lowercase());
    update.orientation = update
        .orientation
        .map(|list| dedup(list.into_iter().map(|o| o.trim().to_lowercase())));
    update.languages = update
        .languages
        .map(|list| dedup(list.into_iter().map(|l| l.trim().to_string())));
    update.name = update.name.map(|n| n.trim().to_string());
    update
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{auth, TestApp};

    #[test]
    fn normalization() {
        let update = normalize(ProfileUpdate {
            gender: Some(" Woman ".into()),
            orientation: Some(vec!["Man".into(), "man".into(), "WOMAN".into(), " ".into()]),
            languages: Some(vec!["French".into(), "French".into(), "English".into()]),
            ..Default::default()
        });
        assert_eq!(update.gender.as_deref(), Some("woman"));
        assert_eq!(update.orientation.unwrap(), vec!["man", "woman"]);
        assert_eq!(update.languages.unwrap(), vec!["French", "English"]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<ProfileUpdate>(r#"{"name":"Ana","likesSent":[]}"#);
        assert!(err.is_err());
        let ok: ProfileUpdate = serde_json::from_str(r#"{"lookingFor":"friends"}"#).unwrap();
        assert_eq!(ok.looking_for.as_deref(), Some("friends"));
    }

    #[tokio::test]
    async fn update_writes_only_supplied_fields() {
        let app = TestApp::new();
        app.user("auth0|p").await;

        update_profile(&app.state, &auth("auth0|p"), ProfileUpdate {
            name: Some("Ana".into()),
            bio: Some("hello".into()),
            ..Default::default()
        })
        .await
        .unwrap();

        let user = update_profile(&app.state, &auth("auth0|p"), ProfileUpdate {
            age: Some(29),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(user.name.as_deref(), Some("Ana"));
        assert_eq!(user.bio.as_deref(), Some("hello"));
        assert_eq!(user.age, Some(29));
    }

    #[tokio::test]
    async fn invalid_values_are_rejected_before_writing() {
        let app = TestApp::new();
        app.user("auth0|p").await;

        let err = update_profile(&app.state, &auth("auth0|p"), ProfileUpdate {
            name: Some("Ana".into()),
            age: Some(12),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let user = identity::resolve(&app.state, &auth("auth0|p")).await.unwrap();
        assert!(user.name.is_none());
    }

    #[tokio::test]
    async fn location_round_trip_keeps_label_when_omitted() {
        let app = TestApp::new();
        app.user("auth0|loc").await;
        let caller = auth("auth0|loc");

        set_location(&app.state, &caller, GeoPoint::new(45.0, 5.0).unwrap(), Some("Lyon".into()))
            .await
            .unwrap();
        let view = set_location(&app.state, &caller, GeoPoint::new(45.5, 5.5).unwrap(), None)
            .await
            .unwrap();

        assert_eq!(view, LocationView { latitude: Some(45.5), longitude: Some(5.5), label: Some("Lyon".into()) });
        assert_eq!(location(&app.state, &caller).await.unwrap(), view);
    }

    #[tokio::test]
    async fn public_profile_of_unknown_user() {
        let app = TestApp::new();
        app.user("auth0|me").await;
        let err = public_profile(&app.state, &auth("auth0|me"), Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserNotFound);
    }
}
