//! In-process [`SessionStore`].
//!
//! Each trait method runs under one acquisition of the map lock, which gives
//! it the same all-or-nothing behaviour as the single-statement Postgres
//! queries. Used by the test suites and by `SESSION_STORE=memory` runs.

use std::collections::HashMap;

use async_trait::async_trait;
use quill_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

use crate::models::session::{CreateSession, RotationUpdate, UserSession};
use crate::store::{SessionStore, StoreError};

/// Sessions held in a `RwLock<HashMap>` keyed by session id.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, UserSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, live or expired.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Count rows owned by `user_id`, live or expired.
    pub async fn count_for_user(&self, user_id: DbId) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

fn row_from(input: &CreateSession) -> UserSession {
    UserSession {
        id: input.id.clone(),
        user_id: input.user_id,
        refresh_hash_current: input.refresh_hash.clone(),
        refresh_hash_previous: None,
        user_agent: input.fingerprint.user_agent.clone(),
        ip_address: input.fingerprint.ip_address.clone(),
        created_at: input.created_at,
        last_refreshed_at: None,
        expires_at: input.expires_at,
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, input: &CreateSession) -> Result<UserSession, StoreError> {
        let row = row_from(input);
        self.sessions
            .write()
            .await
            .insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn replace_user_session(
        &self,
        input: &CreateSession,
    ) -> Result<UserSession, StoreError> {
        let row = row_from(input);
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.user_id != input.user_id);
        sessions.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn find_live(
        &self,
        session_id: &str,
        now: Timestamp,
    ) -> Result<Option<UserSession>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .filter(|s| s.is_live(now))
            .cloned())
    }

    async fn find_by_user(&self, user_id: DbId) -> Result<Option<UserSession>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn delete_by_id(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn delete_by_user(&self, user_id: DbId) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn update_rotation(&self, update: &RotationUpdate) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&update.session_id) else {
            return Ok(false);
        };
        if session.refresh_hash_current != update.expected_hash
            || !session.is_live(update.refreshed_at)
        {
            return Ok(false);
        }
        session.refresh_hash_previous = Some(std::mem::replace(
            &mut session.refresh_hash_current,
            update.new_hash.clone(),
        ));
        session.last_refreshed_at = Some(update.refreshed_at);
        Ok(true)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
