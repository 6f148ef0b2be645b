//! User session model and DTOs.

use quill_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A user session row from the `user_sessions` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserSession {
    /// Opaque session id (UUIDv7 string). Stable for the session's life.
    pub id: String,
    pub user_id: DbId,
    /// Keyed digest of the refresh token that is valid right now.
    pub refresh_hash_current: String,
    /// Digest of the refresh token replaced by the last rotation.
    pub refresh_hash_previous: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: Timestamp,
    pub last_refreshed_at: Option<Timestamp>,
    pub expires_at: Timestamp,
}

impl UserSession {
    /// A session is live strictly before its absolute expiry.
    pub fn is_live(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// Informational client details recorded at login. Never used to authorize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFingerprint {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// DTO for creating a new user session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub id: String,
    pub user_id: DbId,
    pub refresh_hash: String,
    pub fingerprint: ClientFingerprint,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

/// Conditional rotation write.
///
/// Applied only while the stored `refresh_hash_current` still equals
/// `expected_hash`; the expected hash becomes `refresh_hash_previous`.
#[derive(Debug, Clone)]
pub struct RotationUpdate {
    pub session_id: String,
    pub expected_hash: String,
    pub new_hash: String,
    pub refreshed_at: Timestamp,
}
