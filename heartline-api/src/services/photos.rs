use std::collections::HashSet;

use heartline_shared::errors::{AppError, AppResult, ErrorCode};
use heartline_shared::types::AuthUser;

use crate::services::identity;
use crate::storage::extension_for;
use crate::store::PhotoAppend;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct UploadedPhoto {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Store a batch of photos and append them to the caller's list. The batch
/// is all or nothing: if the list would exceed the limit, or any write
/// fails, nothing is appended and every file written for it is removed.
pub async fn upload(state: &AppState, auth: &AuthUser, files: Vec<UploadedPhoto>) -> AppResult<Vec<String>> {
    if files.is_empty() {
        return Err(AppError::new(ErrorCode::PhotoUploadFailed, "no photos provided"));
    }
    if let Some(bad) = files.iter().find(|f| extension_for(&f.content_type).is_none()) {
        return Err(AppError::new(
            ErrorCode::PhotoUploadFailed,
            format!("unsupported image format {}, accepted: jpeg, png, webp, gif", bad.content_type),
        ));
    }

    let user = identity::resolve(state, auth).await?;
    let max = state.config.max_photos;
    if user.photos.len() + files.len() > max {
        return Err(limit_exceeded(user.photos.len(), files.len(), max));
    }

    let attempted = files.len();
    let mut written = Vec::with_capacity(attempted);
    for file in files {
        match state.photos.put(user.id, file.bytes, &file.content_type).await {
            Ok(reference) => written.push(reference),
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "photo write failed");
                discard(state, &written).await;
                return Err(AppError::new(ErrorCode::PhotoUploadFailed, "failed to store photo"));
            }
        }
    }

    let outcome = match state.store.append_photos(user.id, &written, max).await {
        Ok(outcome) => outcome,
        Err(e) => {
            discard(state, &written).await;
            return Err(e);
        }
    };

    match outcome {
        PhotoAppend::Appended(photos) => {
            tracing::info!(user_id = %user.id, added = attempted, total = photos.len(), "photos uploaded");
            Ok(photos)
        }
        PhotoAppend::LimitExceeded { current } => {
            discard(state, &written).await;
            Err(limit_exceeded(current, attempted, max))
        }
        PhotoAppend::UserMissing => {
            discard(state, &written).await;
            Err(AppError::new(ErrorCode::ProfileNotFound, "profile not found"))
        }
    }
}

/// Drop one photo from the list, then release its storage. Storage
/// failures are logged only; the profile change stands.
pub async fn delete(state: &AppState, auth: &AuthUser, reference: &str) -> AppResult<Vec<String>> {
    let user = identity::resolve(state, auth).await?;
    let photos = state
        .store
        .remove_photo(user.id, reference)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::PhotoNotFound, "photo not found in your profile"))?;

    if let Err(e) = state.photos.remove(reference).await {
        tracing::warn!(user_id = %user.id, photo = %reference, error = %e, "photo storage cleanup failed");
    }

    tracing::info!(user_id = %user.id, remaining = photos.len(), "photo deleted");
    Ok(photos)
}

pub async fn reorder(state: &AppState, auth: &AuthUser, order: Vec<String>) -> AppResult<Vec<String>> {
    let unique: HashSet<&String> = order.iter().collect();
    if unique.len() != order.len() {
        return Err(AppError::new(ErrorCode::InvalidPhotoOrder, "photo order contains duplicates"));
    }

    let user = identity::resolve(state, auth).await?;
    let photos = state
        .store
        .replace_photo_order(user.id, &order)
        .await?
        .ok_or_else(|| {
            AppError::new(
                ErrorCode::InvalidPhotoOrder,
                "photo order must list exactly your current photos",
            )
        })?;

    tracing::debug!(user_id = %user.id, "photos reordered");
    Ok(photos)
}

fn limit_exceeded(current: usize, attempted: usize, max: usize) -> AppError {
    AppError::with_details(
        ErrorCode::PhotoLimitExceeded,
        format!("you can have at most {max} photos"),
        serde_json::json!({ "current": current, "attempted": attempted, "max": max }),
    )
}

async fn discard(state: &AppState, written: &[String]) {
    for reference in written {
        if let Err(e) = state.photos.remove(reference).await {
            tracing::warn!(photo = %reference, error = %e, "failed to discard uploaded photo");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{auth, TestApp};

    fn jpegs(n: usize) -> Vec<UploadedPhoto> {
        (0..n)
            .map(|i| UploadedPhoto {
                bytes: vec![i as u8; 8],
                content_type: "image/jpeg".into(),
            })
            .collect()
    }

    fn files_on_disk(app: &TestApp) -> usize {
        std::fs::read_dir(app.uploads.path()).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn batch_over_limit_adds_nothing() {
        let app = TestApp::new();
        app.user("auth0|ph").await;
        let caller = auth("auth0|ph");

        assert_eq!(upload(&app.state, &caller, jpegs(5)).await.unwrap().len(), 5);

        let err = upload(&app.state, &caller, jpegs(2)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PhotoLimitExceeded);

        let user = identity::resolve(&app.state, &caller).await.unwrap();
        assert_eq!(user.photos.len(), 5);
        assert_eq!(files_on_disk(&app), 5);
    }

    #[tokio::test]
    async fn full_profile_rejects_before_writing() {
        let app = TestApp::new();
        let user = app.user("auth0|full").await;
        let filler: Vec<String> = (0..6).map(|i| format!("/uploads/other-{i}.jpg")).collect();
        app.store().append_photos(user.id, &filler, 6).await.unwrap();

        let err = upload(&app.state, &auth("auth0|full"), jpegs(1)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PhotoLimitExceeded);
        assert_eq!(files_on_disk(&app), 0);
    }

    #[tokio::test]
    async fn unsupported_type_rejected_before_any_write() {
        let app = TestApp::new();
        app.user("auth0|t").await;
        let mut files = jpegs(1);
        files.push(UploadedPhoto { bytes: vec![1], content_type: "application/pdf".into() });

        let err = upload(&app.state, &auth("auth0|t"), files).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PhotoUploadFailed);
        assert_eq!(files_on_disk(&app), 0);
    }

    #[tokio::test]
    async fn delete_and_reorder() {
        let app = TestApp::new();
        app.user("auth0|d").await;
        let caller = auth("auth0|d");
        let photos = upload(&app.state, &caller, jpegs(3)).await.unwrap();

        let remaining = delete(&app.state, &caller, &photos[1]).await.unwrap();
        assert_eq!(remaining, vec![photos[0].clone(), photos[2].clone()]);
        assert_eq!(files_on_disk(&app), 2);

        let err = delete(&app.state, &caller, &photos[1]).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PhotoNotFound);

        let reversed = vec![photos[2].clone(), photos[0].clone()];
        assert_eq!(reorder(&app.state, &caller, reversed.clone()).await.unwrap(), reversed);

        let foreign = vec![photos[2].clone(), "/uploads/elsewhere.jpg".to_string()];
        assert_eq!(
            reorder(&app.state, &caller, foreign).await.unwrap_err().code(),
            ErrorCode::InvalidPhotoOrder
        );
        let dup = vec![photos[2].clone(), photos[2].clone()];
        assert_eq!(
            reorder(&app.state, &caller, dup).await.unwrap_err().code(),
            ErrorCode::InvalidPhotoOrder
        );
    }

    #[tokio::test]
    async fn delete_survives_storage_failure() {
        let app = TestApp::new();
        let user = app.user("auth0|s").await;
        app.store()
            .append_photos(user.id, &["/uploads/never-written.jpg".to_string()], 6)
            .await
            .unwrap();

        let remaining = delete(&app.state, &auth("auth0|s"), "/uploads/never-written.jpg").await.unwrap();
        assert!(remaining.is_empty());
    }
}
