//! Collaborators that turn a login code into an internal user id.
//!
//! The OAuth handshake itself happens outside this service: an
//! [`IdentityProvider`] only reports who the code belongs to, and a
//! [`UserDirectory`] maps that external identity onto a `users` row.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use quill_core::types::DbId;
use quill_db::models::user::UpsertUser;
use quill_db::repositories::UserRepo;
use quill_db::store::StoreError;
use quill_db::DbPool;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Who the identity provider says the caller is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub external_id: String,
    pub display_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider refused the code (expired, reused, forged).
    #[error("identity rejected: {0}")]
    Rejected(String),

    /// The provider or directory could not be reached or misbehaved.
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        IdentityError::Unavailable(err.to_string())
    }
}

/// Resolves a one-time login code to a stable external identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_external_user(&self, code: &str) -> Result<ExternalIdentity, IdentityError>;
}

/// Maps an external identity to an internal user id, creating it on first use.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_or_create(&self, identity: &ExternalIdentity) -> Result<DbId, IdentityError>;
}

// ---------------------------------------------------------------------------
// HTTP identity broker
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
    id: String,
    display_name: Option<String>,
}

/// Timeout for a single code exchange.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// [`IdentityProvider`] that posts the code to an identity broker.
///
/// The broker performs the provider handshake and answers
/// `{"id": "...", "displayName": "..."}`; any 4xx is a rejection.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    exchange_url: String,
}

impl HttpIdentityProvider {
    pub fn new(exchange_url: impl Into<String>) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(EXCHANGE_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            exchange_url: exchange_url.into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve_external_user(&self, code: &str) -> Result<ExternalIdentity, IdentityError> {
        let response = self
            .client
            .post(&self.exchange_url)
            .json(&ExchangeRequest { code })
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(IdentityError::Rejected(format!("broker answered {status}")));
        }
        if !status.is_success() {
            return Err(IdentityError::Unavailable(format!("broker answered {status}")));
        }

        let body: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("invalid broker response: {e}")))?;
        into_identity(body)
    }
}

fn into_identity(body: ExchangeResponse) -> Result<ExternalIdentity, IdentityError> {
    let external_id = body.id.trim().to_string();
    if external_id.is_empty() {
        return Err(IdentityError::Unavailable("broker returned an empty id".into()));
    }
    let display_name = body
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| external_id.clone());
    Ok(ExternalIdentity {
        external_id,
        display_name,
    })
}

// ---------------------------------------------------------------------------
// User directories
// ---------------------------------------------------------------------------

/// [`UserDirectory`] backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: DbPool,
}

impl PgUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_or_create(&self, identity: &ExternalIdentity) -> Result<DbId, IdentityError> {
        let input = UpsertUser {
            external_id: identity.external_id.clone(),
            display_name: identity.display_name.clone(),
        };
        let user = UserRepo::find_or_create(&self.pool, &input)
            .await
            .map_err(StoreError::from)?;
        Ok(user.id)
    }
}

/// In-process [`UserDirectory`] handing out sequential ids from 1.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, DbId>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_or_create(&self, identity: &ExternalIdentity) -> Result<DbId, IdentityError> {
        let mut users = self.users.write().await;
        let next_id = users.len() as DbId + 1;
        Ok(*users
            .entry(identity.external_id.clone())
            .or_insert(next_id))
    }
}
