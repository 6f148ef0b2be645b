//! Handlers for the `/auth` resource (login, refresh, logout, session).
//!
//! Session id and refresh token travel only as `HttpOnly` cookies; the
//! access token is returned in the `Authorization` response header.

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use quill_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::auth::cookies::{clear_credentials, read_credentials, set_credentials};
use crate::auth::session::{IssuedTokens, RotationOutcome};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::client::ClientInfo;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// One-time code from the external identity provider.
    pub code: String,
}

/// Payload of a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: DbId,
    pub session_id: String,
    pub display_name: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Payload of a successful refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Payload of `GET /auth/session`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: DbId,
    pub session_id: String,
}

fn bearer_header(access_token: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {access_token}"))
        .map_err(|e| AppError::InternalError(format!("Invalid access token header: {e}")))
}

/// Cookies for `tokens`, plus the access token header value.
fn credentials_for(
    state: &AppState,
    jar: CookieJar,
    tokens: &IssuedTokens,
) -> AppResult<(CookieJar, HeaderValue)> {
    let jar = set_credentials(
        jar,
        &tokens.session_id,
        &tokens.refresh_token,
        tokens.session_lifetime_secs(Utc::now()),
        &state.config.cookies,
    );
    Ok((jar, bearer_header(&tokens.access_token)?))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Exchange a provider code for a fresh session. Any session the user
/// already had is replaced, so tokens issued for it stop working.
pub async fn login(
    State(state): State<AppState>,
    ClientInfo(fingerprint): ClientInfo,
    jar: CookieJar,
    Json(input): Json<LoginRequest>,
) -> AppResult<Response> {
    let code = input.code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("code must not be empty".into()));
    }

    let identity = state.identity.resolve_external_user(code).await?;
    let user_id = state.users.find_or_create(&identity).await?;

    let tokens = state
        .sessions
        .establish(user_id, fingerprint, Utc::now())
        .await?;
    let (jar, bearer) = credentials_for(&state, jar, &tokens)?;

    tracing::info!(user_id, session_id = %tokens.session_id, "User logged in");

    let body = LoginResponse {
        user_id,
        session_id: tokens.session_id,
        display_name: identity.display_name,
        expires_in: tokens.access_expires_in,
    };
    Ok((jar, [(AUTHORIZATION, bearer)], Json(DataResponse { data: body })).into_response())
}

/// POST /api/v1/auth/refresh
///
/// Rotate the refresh token presented in cookies. Every failure to rotate
/// clears the credential cookies and answers `SessionExpired`; store
/// failures answer 500 and leave the cookies alone.
pub async fn refresh(State(state): State<AppState>, jar: CookieJar) -> AppResult<Response> {
    let Some(presented) = read_credentials(&jar) else {
        return Err(AppError::Unauthorized("Session credentials missing".into()));
    };

    let outcome = state
        .sessions
        .rotate(&presented.session_id, &presented.refresh_token, Utc::now())
        .await?;

    let tokens = match outcome {
        RotationOutcome::Rotated(tokens) => tokens,
        RotationOutcome::Rejected | RotationOutcome::Revoked | RotationOutcome::Superseded => {
            let jar = clear_credentials(jar, &state.config.cookies);
            return Ok((jar, AppError::SessionExpired).into_response());
        }
    };

    let (jar, bearer) = credentials_for(&state, jar, &tokens)?;
    let body = RefreshResponse {
        expires_in: tokens.access_expires_in,
    };
    Ok((jar, [(AUTHORIZATION, bearer)], Json(DataResponse { data: body })).into_response())
}

/// POST /api/v1/auth/logout
///
/// End the caller's session and clear the credential cookies.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, StatusCode)> {
    state.sessions.end(&auth.session_id).await?;
    tracing::info!(user_id = auth.user_id, session_id = %auth.session_id, "User logged out");

    Ok((clear_credentials(jar, &state.config.cookies), StatusCode::NO_CONTENT))
}

/// GET /api/v1/auth/session
///
/// Describe the session the access token is bound to.
pub async fn current_session(auth: AuthUser) -> Json<DataResponse<SessionInfo>> {
    Json(DataResponse {
        data: SessionInfo {
            user_id: auth.user_id,
            session_id: auth.session_id,
        },
    })
}
