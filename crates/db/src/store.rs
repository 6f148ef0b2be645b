//! The session store seam.
//!
//! The rotation protocol and the request middleware only ever talk to a
//! [`SessionStore`]. Every method is a single atomic unit against the
//! backing store; no caller holds locks across calls.

use async_trait::async_trait;
use quill_core::types::{DbId, Timestamp};

use crate::models::session::{CreateSession, RotationUpdate, UserSession};
use crate::repositories::SessionRepo;
use crate::DbPool;

/// Errors surfaced by a [`SessionStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistent session records, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session.
    ///
    /// The Postgres store rejects a second session for the same user with a
    /// unique violation on `user_id`; the memory store does not check. Logins
    /// go through [`SessionStore::replace_user_session`].
    async fn create_session(&self, input: &CreateSession) -> Result<UserSession, StoreError>;

    /// Atomically drop any session the user has and insert `input`.
    async fn replace_user_session(&self, input: &CreateSession)
        -> Result<UserSession, StoreError>;

    /// Return the session only if `now` is before its expiry.
    async fn find_live(
        &self,
        session_id: &str,
        now: Timestamp,
    ) -> Result<Option<UserSession>, StoreError>;

    async fn find_by_user(&self, user_id: DbId) -> Result<Option<UserSession>, StoreError>;

    async fn delete_by_id(&self, session_id: &str) -> Result<bool, StoreError>;

    async fn delete_by_user(&self, user_id: DbId) -> Result<u64, StoreError>;

    /// Conditional rotation write; `false` means the expected hash no longer
    /// matched (or the session is gone).
    async fn update_rotation(&self, update: &RotationUpdate) -> Result<bool, StoreError>;

    /// Cheap reachability probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// [`SessionStore`] backed by the `user_sessions` Postgres table.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, input: &CreateSession) -> Result<UserSession, StoreError> {
        Ok(SessionRepo::create(&self.pool, input).await?)
    }

    async fn replace_user_session(
        &self,
        input: &CreateSession,
    ) -> Result<UserSession, StoreError> {
        Ok(SessionRepo::replace_for_user(&self.pool, input).await?)
    }

    async fn find_live(
        &self,
        session_id: &str,
        now: Timestamp,
    ) -> Result<Option<UserSession>, StoreError> {
        Ok(SessionRepo::find_live(&self.pool, session_id, now).await?)
    }

    async fn find_by_user(&self, user_id: DbId) -> Result<Option<UserSession>, StoreError> {
        Ok(SessionRepo::find_by_user(&self.pool, user_id).await?)
    }

    async fn delete_by_id(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(SessionRepo::delete_by_id(&self.pool, session_id).await?)
    }

    async fn delete_by_user(&self, user_id: DbId) -> Result<u64, StoreError> {
        Ok(SessionRepo::delete_by_user(&self.pool, user_id).await?)
    }

    async fn update_rotation(&self, update: &RotationUpdate) -> Result<bool, StoreError> {
        Ok(SessionRepo::update_rotation(&self.pool, update).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
