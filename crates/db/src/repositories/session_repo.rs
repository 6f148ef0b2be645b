//! Repository for the `user_sessions` table.

use quill_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::session::{CreateSession, RotationUpdate, UserSession};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, refresh_hash_current, refresh_hash_previous, \
                        user_agent, ip_address, created_at, last_refreshed_at, expires_at";

/// Provides persistence for user sessions. Liveness filtering is the only
/// rule applied here; every policy decision lives in the API crate.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session, returning the created row.
    ///
    /// Fails with a unique violation if the user already has a session; use
    /// [`SessionRepo::replace_for_user`] for logins.
    pub async fn create(pool: &PgPool, input: &CreateSession) -> Result<UserSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_sessions
                (id, user_id, refresh_hash_current, user_agent, ip_address, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(&input.id)
            .bind(input.user_id)
            .bind(&input.refresh_hash)
            .bind(&input.fingerprint.user_agent)
            .bind(&input.fingerprint.ip_address)
            .bind(input.created_at)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Replace whatever session the user has with a new one, atomically.
    ///
    /// A single upsert keyed by the `uq_user_sessions_user_id` constraint:
    /// concurrent logins for the same user serialize on the row lock and
    /// exactly one session survives.
    pub async fn replace_for_user(
        pool: &PgPool,
        input: &CreateSession,
    ) -> Result<UserSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_sessions
                (id, user_id, refresh_hash_current, user_agent, ip_address, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (user_id) DO UPDATE
                SET id = EXCLUDED.id,
                    refresh_hash_current = EXCLUDED.refresh_hash_current,
                    refresh_hash_previous = NULL,
                    user_agent = EXCLUDED.user_agent,
                    ip_address = EXCLUDED.ip_address,
                    created_at = EXCLUDED.created_at,
                    last_refreshed_at = NULL,
                    expires_at = EXCLUDED.expires_at
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(&input.id)
            .bind(input.user_id)
            .bind(&input.refresh_hash)
            .bind(&input.fingerprint.user_agent)
            .bind(&input.fingerprint.ip_address)
            .bind(input.created_at)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find a session by id, treating expired rows as absent.
    pub async fn find_live(
        pool: &PgPool,
        id: &str,
        now: Timestamp,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM user_sessions WHERE id = $1 AND expires_at > $2");
        sqlx::query_as::<_, UserSession>(&query)
            .bind(id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Find the session owned by a user, live or not.
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<UserSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_sessions WHERE user_id = $1");
        sqlx::query_as::<_, UserSession>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a single session. Returns `true` if a row was removed.
    pub async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session for a user. Returns the count of deleted rows.
    pub async fn delete_by_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Compare-and-swap the rotation fields.
    ///
    /// Only updates the row while `refresh_hash_current` still equals
    /// `expected_hash` and the session has not expired. Returns `false` when
    /// another rotation got there first (or the session is gone).
    pub async fn update_rotation(
        pool: &PgPool,
        update: &RotationUpdate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions
                SET refresh_hash_previous = refresh_hash_current,
                    refresh_hash_current = $3,
                    last_refreshed_at = $4
              WHERE id = $1
                AND refresh_hash_current = $2
                AND expires_at > $4",
        )
        .bind(&update.session_id)
        .bind(&update.expected_hash)
        .bind(&update.new_hash)
        .bind(update.refreshed_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
