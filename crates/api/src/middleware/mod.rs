//! Request authentication middleware and extractors.
//!
//! - [`auth::authenticate`] -- Validates bearer tokens against live sessions.
//! - [`auth::AuthUser`] -- Extracts the authenticated caller.
//! - [`client::ClientInfo`] -- Extracts informational client details.

pub mod auth;
pub mod client;
