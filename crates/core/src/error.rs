use crate::hashing::HashError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Keyed hashing could not run. Always a deployment problem, never
    /// something the caller can fix by retrying.
    #[error("Hashing unavailable: {0}")]
    Hashing(#[from] HashError),
}
