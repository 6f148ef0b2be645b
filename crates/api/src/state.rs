use std::sync::Arc;

use crate::auth::identity::{IdentityProvider, UserDirectory};
use crate::auth::session::SessionService;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (everything is behind an `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session lifecycle over the configured session store.
    pub sessions: Arc<SessionService>,
    /// Resolves login codes to external identities.
    pub identity: Arc<dyn IdentityProvider>,
    /// Maps external identities to internal user ids.
    pub users: Arc<dyn UserDirectory>,
}
