//! HMAC-SHA256 keyed hashing.
//!
//! Refresh tokens are persisted only as a keyed digest so a database leak
//! does not expose live credentials. The same primitive hashes public share
//! codes, under a different key, so the two digest spaces never overlap.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded HMAC-SHA256 digest.
pub const DIGEST_HEX_LENGTH: usize = 64;

/// What a [`KeyedHasher`] is used for. Each domain gets its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashDomain {
    RefreshToken,
    ShareCode,
}

impl HashDomain {
    pub fn as_str(self) -> &'static str {
        match self {
            HashDomain::RefreshToken => "refresh_token",
            HashDomain::ShareCode => "share_code",
        }
    }
}

/// Keyed hashing failed because of bad key material.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HashError {
    #[error("empty key material for {0} hashing")]
    EmptyKey(&'static str),

    #[error("invalid key material for {domain} hashing: {reason}")]
    InvalidKey { domain: &'static str, reason: String },
}

/// Deterministic keyed hasher bound to one [`HashDomain`].
#[derive(Clone)]
pub struct KeyedHasher {
    domain: HashDomain,
    key: Vec<u8>,
}

impl std::fmt::Debug for KeyedHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedHasher")
            .field("domain", &self.domain)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl KeyedHasher {
    /// Build a hasher for `domain` keyed with `key`.
    ///
    /// Empty key material is rejected up front so a missing secret surfaces
    /// at startup rather than on the first login.
    pub fn new(domain: HashDomain, key: impl AsRef<[u8]>) -> Result<Self, HashError> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(HashError::EmptyKey(domain.as_str()));
        }
        Ok(Self {
            domain,
            key: key.to_vec(),
        })
    }

    pub fn domain(&self) -> HashDomain {
        self.domain
    }

    /// Hash the UTF-8 bytes of `plaintext`, returning a lowercase hex digest.
    pub fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let mut mac = self.mac()?;
        mac.update(plaintext.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check `plaintext` against a stored hex digest in constant time.
    ///
    /// A digest that is not valid hex never matches.
    pub fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, HashError> {
        let Some(expected) = hex::decode(digest) else {
            return Ok(false);
        };
        let mut mac = self.mac()?;
        mac.update(plaintext.as_bytes());
        Ok(mac.verify_slice(&expected).is_ok())
    }

    fn mac(&self) -> Result<HmacSha256, HashError> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| HashError::InvalidKey {
            domain: self.domain.as_str(),
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// hex encoding helper (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string, returning `None` on odd length or non-hex input.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| s.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
            .collect()
    }
}
