//! Request authentication.
//!
//! [`authenticate`] runs on every request. It never rejects a request for
//! lacking credentials (route extractors decide that), but it does hard
//! reject a correctly signed access token whose session is gone: that is how
//! the single-session policy reaches tokens issued before a newer login.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use quill_core::types::DbId;

use crate::auth::jwt::verify_access_token;
use crate::error::AppError;
use crate::state::AppState;

/// Paths that skip authentication entirely.
pub const PUBLIC_PATHS: &[&str] = &["/health", "/api/v1/auth/login", "/api/v1/auth/refresh"];

/// Path prefixes that skip authentication entirely.
pub const PUBLIC_PREFIXES: &[&str] = &["/static/"];

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Authenticated caller, attached to the request by [`authenticate`].
///
/// Use this as an extractor parameter in any handler that requires
/// authentication:
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, session_id = %user.session_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
    /// The live session the access token is bound to.
    pub session_id: String,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Per-request authentication middleware.
///
/// 1. Public paths pass straight through.
/// 2. No or malformed bearer header: continue unauthenticated.
/// 3. Token fails verification: continue unauthenticated.
/// 4. Token's session is not live: reject with `SessionNotFound`.
/// 5. Otherwise attach [`AuthUser`] and continue.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_public_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let Some(token) = bearer_token(request.headers()) else {
        return Ok(next.run(request).await);
    };

    let identity = match verify_access_token(&token, state.sessions.jwt()) {
        Ok(identity) => identity,
        Err(err) => {
            tracing::debug!(kind = err.kind(), error = %err, "Ignoring unverifiable access token");
            return Ok(next.run(request).await);
        }
    };

    let session = state
        .sessions
        .store()
        .find_live(&identity.session_id, Utc::now())
        .await?;
    match session {
        Some(session) if session.user_id == identity.user_id => {}
        _ => {
            tracing::info!(
                user_id = identity.user_id,
                session_id = %identity.session_id,
                "Access token refers to a session that is no longer live"
            );
            return Err(AppError::SessionNotFound);
        }
    }

    request.extensions_mut().insert(AuthUser {
        user_id: identity.user_id,
        session_id: identity.session_id,
    });
    Ok(next.run(request).await)
}
