//! Domain primitives shared by the database and API crates.
//!
//! - [`hashing`] -- HMAC keyed hashing for refresh tokens and share codes.
//! - [`tokens`] -- opaque refresh-token and session-id generation.
//! - [`error`] -- domain error types.

pub mod error;
pub mod hashing;
pub mod tokens;
pub mod types;
