use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use heartline_shared::errors::{AppError, AppResult, ErrorCode};
use heartline_shared::types::AuthUser;

use crate::models::User;
use crate::store::DeletedUser;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Find or create the internal user behind a verified subject.
pub async fn provision(state: &AppState, auth: &AuthUser) -> AppResult<(User, bool)> {
    let (user, created) = state
        .store
        .provision_user(&auth.subject, auth.email.as_deref())
        .await?;

    if created {
        tracing::info!(user_id = %user.id, subject = %auth.subject, "user provisioned");
    }
    Ok((user, created))
}

/// The caller's user record; never creates one.
pub async fn resolve(state: &AppState, auth: &AuthUser) -> AppResult<User> {
    state
        .store
        .user_by_subject(&auth.subject)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found, call /user/init first"))
}

/// Identity provider reported the account gone: remove the user, their
/// pairs and messages, then release photo storage.
pub async fn delete_account(state: &AppState, subject: &str) -> AppResult<DeletedUser> {
    let user = state
        .store
        .user_by_subject(subject)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "no user for this subject"))?;

    let deleted = state
        .store
        .delete_user(user.id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user already deleted"))?;

    for photo in &deleted.user.photos {
        if let Err(e) = state.photos.remove(photo).await {
            tracing::warn!(user_id = %user.id, photo = %photo, error = %e, "photo cleanup failed");
        }
    }

    tracing::info!(
        user_id = %user.id,
        messages_removed = deleted.messages_removed,
        "user deleted"
    );
    Ok(deleted)
}

/// Hex HMAC-SHA256 over `"{timestamp}.{body}"`.
pub fn sign_webhook(secret: &str, timestamp: i64, body: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::internal(format!("webhook key rejected: {e}")))?;
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_webhook(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> AppResult<()> {
    let invalid = |msg: &str| AppError::new(ErrorCode::InvalidWebhookSignature, msg);

    let timestamp: i64 = timestamp
        .ok_or_else(|| invalid("missing timestamp header"))?
        .trim()
        .parse()
        .map_err(|_| invalid("malformed timestamp header"))?;
    let signature = signature.ok_or_else(|| invalid("missing signature header"))?;

    if (now - timestamp).abs() > tolerance_secs {
        return Err(invalid("timestamp outside the replay window"));
    }

    let expected = sign_webhook(secret, timestamp, body)?;
    if bool::from(expected.as_bytes().ct_eq(signature.trim().as_bytes())) {
        Ok(())
    } else {
        Err(invalid("signature mismatch"))
    }
}
