//! User directory model and DTOs.

use quill_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    /// Stable identifier issued by the external identity provider.
    pub external_id: String,
    pub display_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for resolving (or creating) a user by external identity.
#[derive(Debug, Clone)]
pub struct UpsertUser {
    pub external_id: String,
    pub display_name: String,
}
