//! JWT access-token issuing and verification.
//!
//! Access tokens are HS256-signed JWTs bound to a server-side session via the
//! `sid` claim. They carry no revocation state: whether the session is still
//! live is decided by the session store on every request.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{
    crypto, decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use quill_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, EnvLookup};

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Session id the token is bound to.
    pub sid: String,
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// Issuer, checked on verification.
    pub iss: String,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

/// The identity a verified access token asserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessIdentity {
    pub session_id: String,
    pub user_id: DbId,
}

/// Why an access token was refused.
///
/// Callers treat every variant the same way (the request is not
/// authenticated); the distinction exists for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token claims are malformed: {0}")]
    MalformedClaims(String),

    #[error("token is not supported: {0}")]
    Unsupported(String),
}

impl TokenError {
    /// Short stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::SignatureInvalid => "signature_invalid",
            TokenError::Expired => "expired",
            TokenError::MalformedClaims(_) => "malformed_claims",
            TokenError::Unsupported(_) => "unsupported",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            JwtErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            JwtErrorKind::ExpiredSignature => TokenError::Expired,
            JwtErrorKind::MissingRequiredClaim(claim) => {
                TokenError::MalformedClaims(format!("missing claim `{claim}`"))
            }
            JwtErrorKind::Json(e) => TokenError::MalformedClaims(e.to_string()),
            JwtErrorKind::InvalidIssuer => TokenError::Unsupported("unknown issuer".into()),
            _ => TokenError::Unsupported(err.to_string()),
        }
    }
}

/// Configuration for JWT token generation and validation.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Value of the `iss` claim; tokens from any other issuer are refused.
    pub issuer: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_token_expiry_mins", &self.access_token_expiry_mins)
            .finish()
    }
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default token issuer.
const DEFAULT_ISSUER: &str = "quill";

impl JwtConfig {
    /// Load JWT configuration.
    ///
    /// | Env Var                  | Required | Default |
    /// |--------------------------|----------|---------|
    /// | `JWT_SECRET`             | **yes**  | --      |
    /// | `JWT_ISSUER`             | no       | `quill` |
    /// | `JWT_ACCESS_EXPIRY_MINS` | no       | `15`    |
    pub fn from_lookup(env: &EnvLookup<'_>) -> Result<Self, ConfigError> {
        let secret = env.required("JWT_SECRET")?;
        let issuer = env.string_or("JWT_ISSUER", DEFAULT_ISSUER);
        let access_token_expiry_mins =
            env.parse_or("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS)?;
        if access_token_expiry_mins <= 0 {
            return Err(ConfigError::Invalid {
                var: "JWT_ACCESS_EXPIRY_MINS",
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            secret,
            issuer,
            access_token_expiry_mins,
        })
    }

    /// Access token lifetime in seconds.
    pub fn access_expiry_secs(&self) -> i64 {
        self.access_token_expiry_mins * 60
    }
}

/// Sign a set of claims with the configured secret.
fn encode_claims(
    claims: &Claims,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Generate an HS256 access token bound to `session_id`.
pub fn issue_access_token(
    user_id: DbId,
    session_id: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sid: session_id.to_string(),
        sub: user_id,
        iss: config.issuer.clone(),
        iat: now,
        exp: now + config.access_expiry_secs(),
    };
    encode_claims(&claims, config)
}

/// Verify an access token and return the identity it carries.
///
/// Checks the HS256 signature over the raw `header.payload` bytes before
/// anything is decoded, then expiry (no leeway) and issuer, then that `sid`
/// is non-empty and `sub` is a positive id.
pub fn verify_access_token(token: &str, config: &JwtConfig) -> Result<AccessIdentity, TokenError> {
    let key = DecodingKey::from_secret(config.secret.as_bytes());

    let (signed, signature) = token
        .rsplit_once('.')
        .ok_or_else(|| TokenError::Unsupported("not a compact JWT".into()))?;
    match crypto::verify(signature, signed.as_bytes(), &key, Algorithm::HS256) {
        Ok(true) => {}
        Ok(false) | Err(_) => return Err(TokenError::SignatureInvalid),
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[config.issuer.as_str()]);
    validation.set_required_spec_claims(&["exp", "iss"]);

    let claims = decode::<Claims>(token, &key, &validation)?.claims;

    if claims.sid.trim().is_empty() {
        return Err(TokenError::MalformedClaims("empty `sid`".into()));
    }
    if claims.sub <= 0 {
        return Err(TokenError::MalformedClaims(format!(
            "non-positive `sub` {}",
            claims.sub
        )));
    }

    Ok(AccessIdentity {
        session_id: claims.sid,
        user_id: claims.sub,
    })
}
