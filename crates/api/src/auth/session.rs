//! Session lifecycle: login, refresh-token rotation, logout.
//!
//! The store is the only shared state. Every decision here is made from one
//! read followed by at most one atomic write, so concurrent requests never
//! need an in-process lock:
//!
//! - login replaces the user's session in a single upsert;
//! - rotation is a compare-and-swap on the current refresh hash;
//! - a refresh token that does not match the current hash revokes the whole
//!   session (fail-closed).

use std::sync::Arc;

use chrono::Duration;
use quill_core::error::CoreError;
use quill_core::hashing::{HashDomain, HashError, KeyedHasher};
use quill_core::tokens::{generate_opaque_token, generate_session_id};
use quill_core::types::{DbId, Timestamp};
use quill_db::models::session::{ClientFingerprint, CreateSession, RotationUpdate};
use quill_db::store::SessionStore;

use crate::auth::jwt::{issue_access_token, JwtConfig};
use crate::config::{ConfigError, EnvLookup};
use crate::error::{AppError, AppResult};

/// Session lifetime and refresh-token hashing key.
#[derive(Clone)]
pub struct SessionConfig {
    /// Absolute session lifetime in days (default: 5).
    pub ttl_days: i64,
    /// HMAC key for refresh-token digests.
    pub refresh_hash_key: String,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("ttl_days", &self.ttl_days)
            .field("refresh_hash_key", &"<redacted>")
            .finish()
    }
}

/// Default session lifetime in days.
const DEFAULT_SESSION_TTL_DAYS: i64 = 5;

impl SessionConfig {
    /// | Env Var            | Required | Default |
    /// |--------------------|----------|---------|
    /// | `REFRESH_HASH_KEY` | **yes**  | --      |
    /// | `SESSION_TTL_DAYS` | no       | `5`     |
    pub fn from_lookup(env: &EnvLookup<'_>) -> Result<Self, ConfigError> {
        let refresh_hash_key = env.required("REFRESH_HASH_KEY")?;
        let ttl_days = env.parse_or("SESSION_TTL_DAYS", DEFAULT_SESSION_TTL_DAYS)?;
        if ttl_days <= 0 {
            return Err(ConfigError::Invalid {
                var: "SESSION_TTL_DAYS",
                reason: "must be positive".into(),
            });
        }
        Ok(Self {
            ttl_days,
            refresh_hash_key,
        })
    }
}

/// Credentials handed to the client after login or a successful rotation.
///
/// Holds the refresh token in plaintext; never log this value.
pub struct IssuedTokens {
    pub session_id: String,
    pub user_id: DbId,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub access_expires_in: i64,
    /// Absolute session expiry; cookie lifetimes are derived from it.
    pub session_expires_at: Timestamp,
}

impl std::fmt::Debug for IssuedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedTokens")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("access_expires_in", &self.access_expires_in)
            .field("session_expires_at", &self.session_expires_at)
            .finish_non_exhaustive()
    }
}

impl IssuedTokens {
    /// Seconds until the session expires, as of `now`.
    pub fn session_lifetime_secs(&self, now: Timestamp) -> i64 {
        (self.session_expires_at - now).num_seconds().max(0)
    }
}

/// Result of one refresh attempt.
#[derive(Debug)]
pub enum RotationOutcome {
    /// The token matched and the conditional write won. New credentials.
    Rotated(IssuedTokens),
    /// No live session with that id.
    Rejected,
    /// The token did not match the current hash; the session was deleted.
    Revoked,
    /// The token matched but a concurrent rotation committed first. The
    /// session is left to the winner.
    Superseded,
}

/// Login, rotation and logout over a [`SessionStore`].
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    hasher: KeyedHasher,
    jwt: JwtConfig,
    ttl: Duration,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("hash_domain", &self.hasher.domain().as_str())
            .field("jwt", &self.jwt)
            .field("ttl_days", &self.ttl.num_days())
            .finish_non_exhaustive()
    }
}

impl SessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        jwt: JwtConfig,
        config: &SessionConfig,
    ) -> Result<Self, HashError> {
        Ok(Self {
            store,
            hasher: KeyedHasher::new(HashDomain::RefreshToken, &config.refresh_hash_key)?,
            jwt,
            ttl: Duration::days(config.ttl_days),
        })
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    /// Start a new session for `user_id`, replacing any existing one.
    pub async fn establish(
        &self,
        user_id: DbId,
        fingerprint: ClientFingerprint,
        now: Timestamp,
    ) -> AppResult<IssuedTokens> {
        let session_id = generate_session_id();
        let refresh_token = generate_opaque_token();
        let refresh_hash = self.hash(&refresh_token)?;

        let input = CreateSession {
            id: session_id,
            user_id,
            refresh_hash,
            fingerprint,
            created_at: now,
            expires_at: now + self.ttl,
        };
        let session = self.store.replace_user_session(&input).await?;
        tracing::info!(user_id, session_id = %session.id, "Session established");

        self.issue(user_id, session.id, refresh_token, session.expires_at)
    }

    /// Exchange a presented refresh token for a new credential pair.
    pub async fn rotate(
        &self,
        session_id: &str,
        refresh_token: &str,
        now: Timestamp,
    ) -> AppResult<RotationOutcome> {
        let Some(session) = self.store.find_live(session_id, now).await? else {
            tracing::info!(session_id, "Refresh for unknown or expired session");
            return Ok(RotationOutcome::Rejected);
        };

        let matches = self
            .hasher
            .verify(refresh_token, &session.refresh_hash_current)
            .map_err(CoreError::from)?;
        if !matches {
            // Stale, replayed or forged. Kill the session outright.
            let deleted = self.store.delete_by_id(&session.id).await?;
            tracing::warn!(
                session_id = %session.id,
                user_id = session.user_id,
                deleted,
                "Refresh token mismatch, session revoked"
            );
            return Ok(RotationOutcome::Revoked);
        }

        let new_refresh_token = generate_opaque_token();
        let update = RotationUpdate {
            session_id: session.id.clone(),
            expected_hash: session.refresh_hash_current,
            new_hash: self.hash(&new_refresh_token)?,
            refreshed_at: now,
        };
        if !self.store.update_rotation(&update).await? {
            tracing::info!(
                session_id = %session.id,
                user_id = session.user_id,
                "Concurrent rotation won the race"
            );
            return Ok(RotationOutcome::Superseded);
        }

        tracing::debug!(session_id = %session.id, user_id = session.user_id, "Session rotated");
        let tokens = self.issue(
            session.user_id,
            session.id,
            new_refresh_token,
            session.expires_at,
        )?;
        Ok(RotationOutcome::Rotated(tokens))
    }

    /// End a session explicitly. Returns whether a row was removed.
    pub async fn end(&self, session_id: &str) -> AppResult<bool> {
        let deleted = self.store.delete_by_id(session_id).await?;
        tracing::info!(session_id, deleted, "Session ended");
        Ok(deleted)
    }

    fn hash(&self, plaintext: &str) -> AppResult<String> {
        Ok(self.hasher.hash(plaintext).map_err(CoreError::from)?)
    }

    fn issue(
        &self,
        user_id: DbId,
        session_id: String,
        refresh_token: String,
        session_expires_at: Timestamp,
    ) -> AppResult<IssuedTokens> {
        let access_token = issue_access_token(user_id, &session_id, &self.jwt)
            .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
        Ok(IssuedTokens {
            session_id,
            user_id,
            access_token,
            refresh_token,
            access_expires_in: self.jwt.access_expiry_secs(),
            session_expires_at,
        })
    }
}
