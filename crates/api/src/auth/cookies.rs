//! Credential cookies.
//!
//! The session id and the refresh secret travel as two `HttpOnly` cookies.
//! The access token never does; it goes in the `Authorization` header.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::config::{ConfigError, EnvLookup};

/// Cookie carrying the opaque session id.
pub const SESSION_COOKIE: &str = "quill_sid";

/// Cookie carrying the opaque refresh token.
pub const REFRESH_COOKIE: &str = "quill_refresh";

/// Credential cookie attributes.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Emit the `Secure` attribute (default: `true`; disable only for
    /// plain-http local development).
    pub secure: bool,
}

impl CookieConfig {
    /// | Env Var         | Default |
    /// |-----------------|---------|
    /// | `COOKIE_SECURE` | `true`  |
    pub fn from_lookup(env: &EnvLookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            secure: env.parse_or("COOKIE_SECURE", true)?,
        })
    }
}

/// The two credentials a refresh request must present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedCredentials {
    pub session_id: String,
    pub refresh_token: String,
}

fn credential_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    config: &CookieConfig,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Add both credential cookies, living for `lifetime_secs`.
pub fn set_credentials(
    jar: CookieJar,
    session_id: &str,
    refresh_token: &str,
    lifetime_secs: i64,
    config: &CookieConfig,
) -> CookieJar {
    let max_age = Duration::seconds(lifetime_secs.max(0));
    jar.add(credential_cookie(
        SESSION_COOKIE,
        session_id.to_string(),
        max_age,
        config,
    ))
    .add(credential_cookie(
        REFRESH_COOKIE,
        refresh_token.to_string(),
        max_age,
        config,
    ))
}

/// Overwrite both credential cookies with expired, empty values.
pub fn clear_credentials(jar: CookieJar, config: &CookieConfig) -> CookieJar {
    jar.add(credential_cookie(SESSION_COOKIE, String::new(), Duration::ZERO, config))
        .add(credential_cookie(REFRESH_COOKIE, String::new(), Duration::ZERO, config))
}

/// Read both credentials; `None` if either is missing or empty.
pub fn read_credentials(jar: &CookieJar) -> Option<PresentedCredentials> {
    let value = |name: &str| {
        jar.get(name)
            .map(|c| c.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };
    Some(PresentedCredentials {
        session_id: value(SESSION_COOKIE)?,
        refresh_token: value(REFRESH_COOKIE)?,
    })
}
