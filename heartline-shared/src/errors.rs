use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Identity errors
/// - E2xxx: Profile and photo errors
/// - E3xxx: Social graph errors
/// - E4xxx: Messaging errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,
    PayloadTooLarge,
    Conflict,

    // Identity (E1xxx)
    InvalidCredentials,
    EmailAlreadyExists,
    TokenExpired,
    TokenInvalid,
    PasswordTooWeak,
    InvalidWebhookSignature,

    // Profile (E2xxx)
    ProfileNotFound,
    UserNotFound,
    PhotoUploadFailed,
    PhotoLimitExceeded,
    PhotoNotFound,
    InvalidPhotoOrder,
    InvalidCoordinates,
    LocationRequired,

    // Social graph (E3xxx)
    CannotLikeSelf,
    AlreadyLiked,
    AlreadyMatched,
    NoPendingLike,

    // Messaging (E4xxx)
    NotMatched,
    EmptyMessage,
    MessageTooLong,
    InvalidRoom,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0008",
            Self::PayloadTooLarge => "E0009",
            Self::Conflict => "E0010",

            // Identity
            Self::InvalidCredentials => "E1001",
            Self::EmailAlreadyExists => "E1002",
            Self::TokenExpired => "E1004",
            Self::TokenInvalid => "E1005",
            Self::PasswordTooWeak => "E1008",
            Self::InvalidWebhookSignature => "E1015",

            // Profile
            Self::ProfileNotFound => "E2001",
            Self::UserNotFound => "E2002",
            Self::PhotoUploadFailed => "E2004",
            Self::PhotoLimitExceeded => "E2009",
            Self::PhotoNotFound => "E2010",
            Self::InvalidPhotoOrder => "E2011",
            Self::InvalidCoordinates => "E2012",
            Self::LocationRequired => "E2013",

            // Social graph
            Self::CannotLikeSelf => "E3001",
            Self::AlreadyLiked => "E3002",
            Self::AlreadyMatched => "E3003",
            Self::NoPendingLike => "E3004",

            // Messaging
            Self::NotMatched => "E4001",
            Self::EmptyMessage => "E4002",
            Self::MessageTooLong => "E4003",
            Self::InvalidRoom => "E4004",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::PasswordTooWeak
            | Self::PhotoUploadFailed | Self::PhotoLimitExceeded | Self::InvalidPhotoOrder
            | Self::InvalidCoordinates | Self::LocationRequired | Self::EmptyMessage
            | Self::MessageTooLong | Self::InvalidRoom => StatusCode::BAD_REQUEST,
            Self::CannotLikeSelf | Self::NoPendingLike => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound | Self::ProfileNotFound | Self::UserNotFound
            | Self::PhotoNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenExpired
            | Self::TokenInvalid | Self::InvalidWebhookSignature => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotMatched => StatusCode::FORBIDDEN,
            Self::Conflict | Self::EmailAlreadyExists | Self::AlreadyLiked
            | Self::AlreadyMatched => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The error code this error will be reported with.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Internal(_) => ErrorCode::InternalError,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Database(_) => ErrorCode::InternalError,
            AppError::Validation(_) => ErrorCode::ValidationError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(ErrorCode::ValidationError, rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(ErrorCode::BadRequest, rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(ErrorCode::BadRequest, rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
