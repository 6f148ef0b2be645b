use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quill_core::error::CoreError;
use quill_db::store::StoreError;
use serde::Serialize;

use crate::auth::identity::IdentityError;

/// Every failure the API can report, with its wire representation.
///
/// Codes are negative and stable; clients branch on `errorCode`, never on
/// the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    /// No live session for the presented credentials, or the refresh token
    /// failed its integrity check. The client must log in again.
    SessionExpired,
    /// The access token is valid but its session no longer exists, usually
    /// because a newer login replaced it.
    SessionNotFound,
    IdentityRejected,
    UpstreamUnavailable,
    InternalServerError,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized
            | ErrorKind::SessionExpired
            | ErrorKind::SessionNotFound
            | ErrorKind::IdentityRejected => StatusCode::UNAUTHORIZED,
            ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ErrorKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ErrorKind::BadRequest => -1000,
            ErrorKind::Unauthorized => -2000,
            ErrorKind::SessionExpired => -2001,
            ErrorKind::SessionNotFound => -2002,
            ErrorKind::IdentityRejected => -2003,
            ErrorKind::InternalServerError => -5000,
            ErrorKind::UpstreamUnavailable => -5002,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::SessionExpired => "Session expired",
            ErrorKind::SessionNotFound => "Session not found",
            ErrorKind::IdentityRejected => "Login rejected",
            ErrorKind::UpstreamUnavailable => "Identity provider unavailable",
            ErrorKind::InternalServerError => "Internal server error",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "The request could not be processed.",
            ErrorKind::Unauthorized => "Authentication is required.",
            ErrorKind::SessionExpired => "Your session has expired. Please log in again.",
            ErrorKind::SessionNotFound => {
                "Your session has ended, possibly because you logged in on another device. \
                 Please log in again."
            }
            ErrorKind::IdentityRejected => "The identity provider did not accept the login.",
            ErrorKind::UpstreamUnavailable => "Login is temporarily unavailable. Try again later.",
            ErrorKind::InternalServerError => "An internal error occurred.",
        }
    }
}

/// JSON error body returned for every [`AppError`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_code: i32,
    pub error_message: String,
    pub error_description: String,
}

/// Application-level error type for HTTP handlers and middleware.
///
/// Wraps [`CoreError`] and [`StoreError`] and adds the session-specific
/// rejections. Implements [`IntoResponse`] to produce an [`ErrorBody`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Keyed hashing failed (a deployment problem).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The session store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The identity collaborator failed or refused the login.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Session expired")]
    SessionExpired,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Core(CoreError::Hashing(_)) | AppError::Store(_) => {
                ErrorKind::InternalServerError
            }
            AppError::Identity(IdentityError::Rejected(_)) => ErrorKind::IdentityRejected,
            AppError::Identity(IdentityError::Unavailable(_)) => ErrorKind::UpstreamUnavailable,
            AppError::SessionExpired => ErrorKind::SessionExpired,
            AppError::SessionNotFound => ErrorKind::SessionNotFound,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::BadRequest(_) => ErrorKind::BadRequest,
            AppError::InternalError(_) => ErrorKind::InternalServerError,
        }
    }

    /// Client-safe detail. Server-side failures never leak their cause.
    fn description(&self) -> String {
        match self {
            AppError::Unauthorized(msg) | AppError::BadRequest(msg) => msg.clone(),
            other => other.kind().description().to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        match kind {
            ErrorKind::InternalServerError => tracing::error!(error = %self, "Internal error"),
            ErrorKind::UpstreamUnavailable => tracing::warn!(error = %self, "Upstream failure"),
            _ => tracing::debug!(error = %self, code = kind.code(), "Request rejected"),
        }

        let body = ErrorBody {
            error_code: kind.code(),
            error_message: kind.message().to_string(),
            error_description: self.description(),
        };

        (kind.status(), axum::Json(body)).into_response()
    }
}
