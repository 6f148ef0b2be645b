#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use quill_db::memory::MemorySessionStore;
use tower::ServiceExt;

use quill_api::auth::cookies::{CookieConfig, REFRESH_COOKIE, SESSION_COOKIE};
use quill_api::auth::identity::{
    ExternalIdentity, IdentityError, IdentityProvider, MemoryUserDirectory,
};
use quill_api::auth::jwt::JwtConfig;
use quill_api::auth::session::{SessionConfig, SessionService};
use quill_api::config::{LogFormat, ServerConfig, StoreBackend};
use quill_api::router::build_router;
use quill_api::state::AppState;

/// Login code the fake provider refuses.
pub const REJECTED_CODE: &str = "rejected-code";

/// Login code for which the fake provider is unreachable.
pub const UNAVAILABLE_CODE: &str = "unavailable-code";

/// Identity provider that treats any other code as the external id itself.
pub struct FakeIdentityProvider;

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn resolve_external_user(&self, code: &str) -> Result<ExternalIdentity, IdentityError> {
        match code {
            REJECTED_CODE => Err(IdentityError::Rejected("code already used".into())),
            UNAVAILABLE_CODE => Err(IdentityError::Unavailable("connection refused".into())),
            other => Ok(ExternalIdentity {
                external_id: other.to_string(),
                display_name: format!("User {other}"),
            }),
        }
    }
}

pub fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-jwt-secret".to_string(),
        issuer: "quill-test".to_string(),
        access_token_expiry_mins: 15,
    }
}

/// Build a test `ServerConfig` with the in-memory store.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        store_backend: StoreBackend::Memory,
        database_url: None,
        identity_exchange_url: "http://identity.invalid/exchange".to_string(),
        log_format: LogFormat::Text,
        jwt: test_jwt_config(),
        session: SessionConfig {
            ttl_days: 5,
            refresh_hash_key: "integration-test-refresh-key".to_string(),
        },
        cookies: CookieConfig { secure: true },
    }
}

/// The application router plus a handle on its session store.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemorySessionStore>,
}

/// Build the full application router with the production middleware stack
/// over an in-memory store and a fake identity provider.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemorySessionStore::new());
    let sessions = SessionService::new(store.clone(), config.jwt.clone(), &config.session)
        .expect("session service should build");

    let state = AppState {
        config: Arc::new(config),
        sessions: Arc::new(sessions),
        identity: Arc::new(FakeIdentityProvider),
        users: Arc::new(MemoryUserDirectory::new()),
    };

    TestApp {
        router: build_router(state).expect("router should build"),
        store,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: &Router, uri: &str, access_token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {access_token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST with an optional bearer token and an optional `Cookie` header.
pub async fn post_with(
    app: &Router,
    uri: &str,
    access_token: Option<&str>,
    cookie_header: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(token) = access_token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(cookies) = cookie_header {
        builder = builder.header(COOKIE, cookies);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Credential helpers
// ---------------------------------------------------------------------------

/// Raw `Set-Cookie` header values.
pub fn set_cookie_headers(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `name -> value` for every cookie set by the response.
pub fn set_cookies(response: &Response<Body>) -> HashMap<String, String> {
    set_cookie_headers(response)
        .iter()
        .filter_map(|header| {
            let pair = header.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Access token from the `Authorization: Bearer` response header.
pub fn bearer(response: &Response<Body>) -> String {
    response
        .headers()
        .get(AUTHORIZATION)
        .expect("response should carry an Authorization header")
        .to_str()
        .unwrap()
        .strip_prefix("Bearer ")
        .expect("Authorization header should be a bearer token")
        .to_string()
}

/// Credentials held by a client after login or refresh.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub access_token: String,
    pub session_id: String,
    pub refresh_token: String,
}

impl ClientCredentials {
    pub fn from_response(response: &Response<Body>) -> Self {
        let cookies = set_cookies(response);
        Self {
            access_token: bearer(response),
            session_id: cookies[SESSION_COOKIE].clone(),
            refresh_token: cookies[REFRESH_COOKIE].clone(),
        }
    }

    pub fn cookie_header(&self) -> String {
        format!(
            "{SESSION_COOKIE}={}; {REFRESH_COOKIE}={}",
            self.session_id, self.refresh_token
        )
    }
}

/// Log in with `code` and return the issued credentials.
pub async fn login(app: &Router, code: &str) -> ClientCredentials {
    let response = post_json(app, "/api/v1/auth/login", serde_json::json!({ "code": code })).await;
    assert_eq!(response.status(), StatusCode::OK);
    ClientCredentials::from_response(&response)
}

/// Refresh with `credentials` and return the raw response.
pub async fn refresh(app: &Router, credentials: &ClientCredentials) -> Response<Body> {
    post_with(
        app,
        "/api/v1/auth/refresh",
        None,
        Some(&credentials.cookie_header()),
    )
    .await
}
