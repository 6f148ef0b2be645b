//! Success envelope shared by API handlers.
//!
//! Successful bodies are `{ "data": ... }`; failures use
//! [`crate::error::ErrorBody`] instead.

use serde::Serialize;

/// `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
