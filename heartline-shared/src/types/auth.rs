use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Claims carried by every bearer token this service accepts, whether it
/// was issued by the external identity provider or by the local scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    pub fn new(subject: impl Into<String>, email: Option<String>, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: subject.into(),
            email,
            iat: now,
            exp: now + duration_secs,
            iss: None,
        }
    }

    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.iss = issuer;
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// The verified caller: an identity-provider subject, not yet resolved to
/// an internal user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub subject: String,
    pub email: Option<String>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            email: claims.email,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AccessToken {
    pub fn bearer(access_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
