use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AccessToken, AuthUser, Claims};

const ASYMMETRIC_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::ES256,
    Algorithm::ES384,
];

/// Verifies bearer tokens and issues tokens for the local credential scheme.
///
/// HS256 tokens are checked against the shared secret. Any asymmetric
/// algorithm is checked against the identity provider's key set, selected
/// by the token's `kid`. Installed on the router as an `Extension` so the
/// `AuthUser` extractor works with any state type.
#[derive(Clone)]
pub struct TokenVerifier {
    inner: Arc<VerifierInner>,
}

struct VerifierInner {
    secret: String,
    issuer: Option<String>,
    ttl_secs: i64,
    jwks: Option<JwkSet>,
}

impl TokenVerifier {
    pub fn new(secret: impl Into<String>, issuer: Option<String>, ttl_secs: i64) -> Self {
        Self {
            inner: Arc::new(VerifierInner {
                secret: secret.into(),
                issuer,
                ttl_secs,
                jwks: None,
            }),
        }
    }

    pub fn with_jwks(self, jwks: JwkSet) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(VerifierInner {
                secret: inner.secret.clone(),
                issuer: inner.issuer.clone(),
                ttl_secs: inner.ttl_secs,
                jwks: Some(jwks),
            }),
        }
    }

    /// Fetch the identity provider's signing keys.
    pub async fn fetch_jwks(url: &str) -> anyhow::Result<JwkSet> {
        let jwks = reqwest::get(url)
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;
        tracing::info!(url = %url, keys = jwks.keys.len(), "loaded identity provider keys");
        Ok(jwks)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let header = decode_header(token)
            .map_err(|e| AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")))?;

        let key = if header.alg == Algorithm::HS256 {
            DecodingKey::from_secret(self.inner.secret.as_bytes())
        } else if ASYMMETRIC_ALGORITHMS.contains(&header.alg) {
            let jwks = self.inner.jwks.as_ref().ok_or_else(|| {
                AppError::new(ErrorCode::TokenInvalid, "no key set configured for this token")
            })?;
            let kid = header
                .kid
                .as_deref()
                .ok_or_else(|| AppError::new(ErrorCode::TokenInvalid, "token has no key id"))?;
            let jwk = jwks
                .find(kid)
                .ok_or_else(|| AppError::new(ErrorCode::TokenInvalid, "unknown signing key"))?;
            DecodingKey::from_jwk(jwk)
                .map_err(|e| AppError::new(ErrorCode::TokenInvalid, format!("unusable signing key: {e}")))?
        } else {
            return Err(AppError::new(ErrorCode::TokenInvalid, "unsupported token algorithm"));
        };

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &self.inner.issuer {
            validation.set_issuer(&[issuer]);
        }

        let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::new(ErrorCode::TokenExpired, "token has expired")
            }
            _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
        })?;

        Ok(token_data.claims)
    }

    /// Issue an HS256 access token for a locally registered subject.
    pub fn issue(&self, subject: &str, email: Option<String>) -> Result<AccessToken, AppError> {
        let claims = Claims::new(subject, email, self.inner.ttl_secs)
            .with_issuer(self.inner.issuer.clone());
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.inner.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token encoding failed: {e}")))?;

        Ok(AccessToken::bearer(token, self.inner.ttl_secs))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let verifier = parts
            .extensions
            .get::<TokenVerifier>()
            .cloned()
            .ok_or_else(|| AppError::internal("token verifier not installed"))?;

        let token = extract_bearer_token(&parts.headers)?;
        let claims = verifier.verify(&token)?;

        if claims.is_expired() {
            return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
        }

        Ok(AuthUser::from(claims))
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "authorization header must use Bearer scheme"))
}
