use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;

use heartline_shared::errors::{AppError, AppResult, ErrorCode};
use heartline_shared::types::AccessToken;

use crate::models::NewCredential;
use crate::AppState;

pub const LOCAL_SUBJECT_PREFIX: &str = "local|";

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::internal(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < 8 {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must be at least 8 characters"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must contain at least one number"));
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must contain at least one letter"));
    }
    Ok(())
}

/// Create a local credential and sign a token for it. The user record
/// itself is provisioned on the first `/user/init`.
pub async fn register(state: &AppState, email: &str, password: &str) -> AppResult<AccessToken> {
    validate_password(password)?;
    let email = email.trim().to_lowercase();
    let id = Uuid::now_v7();

    let credential = state
        .store
        .create_credential(NewCredential {
            id,
            email: email.clone(),
            password_hash: hash_password(password)?,
            subject: format!("{LOCAL_SUBJECT_PREFIX}{id}"),
        })
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"))?;

    tracing::info!(credential_id = %credential.id, "local account registered");
    state.verifier.issue(&credential.subject, Some(credential.email))
}

pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<AccessToken> {
    let invalid = || AppError::new(ErrorCode::InvalidCredentials, "invalid email or password");

    let credential = state
        .store
        .credential_by_email(&email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(password, &credential.password_hash)? {
        tracing::debug!(credential_id = %credential.id, "password mismatch");
        return Err(invalid());
    }

    state.verifier.issue(&credential.subject, Some(credential.email))
}
