//! Opaque credential and identifier generation.
//!
//! Refresh tokens are random secrets handed to the client exactly once;
//! only their keyed digest (see [`crate::hashing`]) is ever stored.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::RngCore;
use uuid::Uuid;

/// Number of random bytes in a refresh token.
pub const OPAQUE_TOKEN_BYTES: usize = 32;

/// Length of the URL-safe encoding of [`OPAQUE_TOKEN_BYTES`] (unpadded base64).
pub const OPAQUE_TOKEN_LENGTH: usize = 43;

/// Generate a fresh opaque refresh token.
///
/// Uses the thread-local CSPRNG and base64url encodes without padding so the
/// value is safe to place in a cookie unescaped.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Generate a new session identifier.
///
/// UUIDv7 strings sort by creation time, which keeps the primary key index
/// append-mostly and makes session ids stable references for the
/// notification layer.
pub fn generate_session_id() -> String {
    Uuid::now_v7().to_string()
}
