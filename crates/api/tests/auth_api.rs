//! HTTP-level integration tests for the auth endpoints.
//!
//! Tests cover login, refresh-token rotation, replay handling, the
//! single-session policy, logout, and the public path allow-list.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{
    body_json, build_test_app, get, get_auth, login, post_json, post_with, refresh,
    set_cookie_headers, ClientCredentials, REJECTED_CODE, UNAVAILABLE_CODE,
};
use quill_db::store::SessionStore;

const LOGIN: &str = "/api/v1/auth/login";
const LOGOUT: &str = "/api/v1/auth/logout";
const REFRESH: &str = "/api/v1/auth/refresh";
const SESSION: &str = "/api/v1/auth/session";

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Successful login returns the session in the body, the access token in the
/// header and both credential cookies.
#[tokio::test]
async fn test_login_success() {
    let app = build_test_app();
    let response = post_json(&app.router, LOGIN, serde_json::json!({ "code": "kakao:42" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let credentials = ClientCredentials::from_response(&response);
    let cookie_headers = set_cookie_headers(&response);
    assert_eq!(cookie_headers.len(), 2);
    for header in &cookie_headers {
        assert!(header.contains("HttpOnly"), "{header}");
        assert!(header.contains("Secure"), "{header}");
        assert!(header.contains("SameSite=Lax"), "{header}");
    }

    let json = body_json(response).await;
    assert_eq!(json["data"]["userId"], 1);
    assert_eq!(json["data"]["sessionId"], credentials.session_id.as_str());
    assert_eq!(json["data"]["displayName"], "User kakao:42");
    assert_eq!(json["data"]["expiresIn"], 900);

    assert_eq!(credentials.refresh_token.len(), 43);
    assert!(app
        .store
        .find_live(&credentials.session_id, Utc::now())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_login_empty_code_is_bad_request() {
    let app = build_test_app();
    let response = post_json(&app.router, LOGIN, serde_json::json!({ "code": "  " })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["errorCode"], -1000);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_login_rejected_by_identity_provider() {
    let app = build_test_app();
    let response =
        post_json(&app.router, LOGIN, serde_json::json!({ "code": REJECTED_CODE })).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["errorCode"], -2003);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_login_with_identity_provider_down() {
    let app = build_test_app();
    let response =
        post_json(&app.router, LOGIN, serde_json::json!({ "code": UNAVAILABLE_CODE })).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["errorCode"], -5002);
    assert!(json["errorDescription"]
        .as_str()
        .is_some_and(|d| !d.contains("connection refused")));
}

/// A second login replaces the first session; the old access token is
/// rejected with `SessionNotFound` even though it is correctly signed.
#[tokio::test]
async fn test_second_login_evicts_first_session() {
    let app = build_test_app();
    let first = login(&app.router, "kakao:7").await;
    let second = login(&app.router, "kakao:7").await;

    assert_ne!(first.session_id, second.session_id);
    assert_eq!(app.store.len().await, 1);

    let response = get_auth(&app.router, SESSION, &first.access_token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2002);

    let response = get_auth(&app.router, SESSION, &second.access_token).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The evicted session's refresh token is dead too.
    let response = refresh(&app.router, &first).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2001);
}

#[tokio::test]
async fn test_different_users_keep_separate_sessions() {
    let app = build_test_app();
    let alice = login(&app.router, "kakao:alice").await;
    let bob = login(&app.router, "kakao:bob").await;

    assert_eq!(app.store.len().await, 2);
    for credentials in [&alice, &bob] {
        let response = get_auth(&app.router, SESSION, &credentials.access_token).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_refresh_rotates_credentials() {
    let app = build_test_app();
    let original = login(&app.router, "kakao:1").await;

    let response = refresh(&app.router, &original).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = ClientCredentials::from_response(&response);
    let json = body_json(response).await;
    assert_eq!(json["data"]["expiresIn"], 900);

    assert_eq!(rotated.session_id, original.session_id);
    assert_ne!(rotated.refresh_token, original.refresh_token);

    let response = get_auth(&app.router, SESSION, &rotated.access_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["sessionId"], original.session_id.as_str());

    // Rotation chains.
    let response = refresh(&app.router, &rotated).await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Replaying a rotated-out refresh token revokes the session: the replayer
/// gets `SessionExpired`, and the legitimate holder's newer access token
/// stops working.
#[tokio::test]
async fn test_refresh_token_replay_revokes_session() {
    let app = build_test_app();
    let original = login(&app.router, "kakao:1").await;

    let response = refresh(&app.router, &original).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = ClientCredentials::from_response(&response);

    let response = refresh(&app.router, &original).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cleared = set_cookie_headers(&response);
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().all(|h| h.contains("Max-Age=0")));
    assert_eq!(body_json(response).await["errorCode"], -2001);

    assert!(app.store.is_empty().await);

    let response = get_auth(&app.router, SESSION, &rotated.access_token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2002);

    let response = refresh(&app.router, &rotated).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2001);
}

#[tokio::test]
async fn test_refresh_with_forged_token_revokes_session() {
    let app = build_test_app();
    let mut credentials = login(&app.router, "kakao:1").await;
    credentials.refresh_token = "A".repeat(43);

    let response = refresh(&app.router, &credentials).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2001);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_refresh_unknown_session() {
    let app = build_test_app();
    let mut credentials = login(&app.router, "kakao:1").await;
    credentials.session_id = "01890000-0000-7000-8000-000000000000".into();

    let response = refresh(&app.router, &credentials).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2001);

    // The real session is untouched.
    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn test_refresh_without_cookies_is_unauthorized() {
    let app = build_test_app();

    let response = post_with(&app.router, REFRESH, None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2000);

    let response = post_with(&app.router, REFRESH, None, Some("quill_sid=abc")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2000);
}

// ---------------------------------------------------------------------------
// Logout and session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_logout_ends_session() {
    let app = build_test_app();
    let credentials = login(&app.router, "kakao:1").await;

    let response = post_with(
        &app.router,
        LOGOUT,
        Some(&credentials.access_token),
        Some(&credentials.cookie_header()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = set_cookie_headers(&response);
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().all(|h| h.contains("Max-Age=0")));
    assert!(app.store.is_empty().await);

    let response = get_auth(&app.router, SESSION, &credentials.access_token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2002);

    let response = refresh(&app.router, &credentials).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_requires_authentication() {
    let app = build_test_app();
    let response = post_with(&app.router, LOGOUT, None, None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2000);
}

#[tokio::test]
async fn test_session_endpoint_describes_caller() {
    let app = build_test_app();
    let credentials = login(&app.router, "kakao:1").await;

    let response = get_auth(&app.router, SESSION, &credentials.access_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["userId"], 1);
    assert_eq!(json["data"]["sessionId"], credentials.session_id.as_str());
}

/// A token that fails verification is ignored, so protected routes answer
/// `Unauthorized` rather than a session error.
#[tokio::test]
async fn test_tampered_access_token_is_unauthenticated() {
    let app = build_test_app();
    let credentials = login(&app.router, "kakao:1").await;

    // Flip the first signature character; it carries six full bits.
    let (signed, signature) = credentials.access_token.rsplit_once('.').unwrap();
    let first = signature.chars().next().unwrap();
    let replacement = if first == 'A' { 'B' } else { 'A' };
    let tampered = format!("{signed}.{replacement}{}", &signature[1..]);

    let response = get_auth(&app.router, SESSION, &tampered).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2000);

    let response = get(&app.router, SESSION).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], -2000);
}

/// Public paths never consult the session store, even with a stale token.
#[tokio::test]
async fn test_public_paths_ignore_stale_tokens() {
    let app = build_test_app();
    let first = login(&app.router, "kakao:1").await;
    let second = login(&app.router, "kakao:1").await;

    let response = get_auth(&app.router, "/health", &first.access_token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_with(
        &app.router,
        REFRESH,
        Some(&first.access_token),
        Some(&second.cookie_header()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
