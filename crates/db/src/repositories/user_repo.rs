//! Repository for the `users` table.

use quill_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{UpsertUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, external_id, display_name, created_at, updated_at";

/// Provides lookups and find-or-create for users.
pub struct UserRepo;

impl UserRepo {
    /// Return the user bound to `input.external_id`, creating it if needed.
    ///
    /// A single upsert, so two first logins racing for the same external
    /// identity still resolve to one row. The display name is refreshed.
    pub async fn find_or_create(pool: &PgPool, input: &UpsertUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (external_id, display_name)
             VALUES ($1, $2)
             ON CONFLICT (external_id) DO UPDATE
                SET display_name = EXCLUDED.display_name,
                    updated_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.external_id)
            .bind(&input.display_name)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
