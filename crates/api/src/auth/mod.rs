//! Authentication and session primitives.
//!
//! - [`jwt`] -- Access-token issuing and verification.
//! - [`session`] -- Login, refresh-token rotation and logout.
//! - [`cookies`] -- Credential cookie handling.
//! - [`identity`] -- External identity and user directory collaborators.

pub mod cookies;
pub mod identity;
pub mod jwt;
pub mod session;
