use crate::auth::cookies::CookieConfig;
use crate::auth::jwt::JwtConfig;
use crate::auth::session::SessionConfig;

/// Configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Variable lookup used by every `from_lookup` constructor.
///
/// Production reads the process environment; tests pass a map so they never
/// touch global state.
pub struct EnvLookup<'a> {
    get: Box<dyn Fn(&str) -> Option<String> + 'a>,
}

impl<'a> EnvLookup<'a> {
    pub fn new(get: impl Fn(&str) -> Option<String> + 'a) -> Self {
        Self { get: Box::new(get) }
    }

    /// Read from the process environment.
    pub fn process() -> EnvLookup<'static> {
        EnvLookup::new(|key| std::env::var(key).ok())
    }

    /// Value of `var`, with empty strings treated as unset.
    pub fn get(&self, var: &str) -> Option<String> {
        (self.get)(var).filter(|v| !v.trim().is_empty())
    }

    pub fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    pub fn string_or(&self, var: &str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    pub fn parse_or<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            }),
        }
    }
}

/// Which [`quill_db::store::SessionStore`] backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown session store `{other}`")),
        }
    }
}

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All non-secret fields have sensible defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for in-flight requests after a shutdown signal (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Session store backend (default: `postgres`).
    pub store_backend: StoreBackend,
    /// Postgres URL; required when the store backend is Postgres.
    pub database_url: Option<String>,
    /// Endpoint that exchanges a login code for an external identity.
    pub identity_exchange_url: String,
    /// Log output format (default: `text`).
    pub log_format: LogFormat,
    /// JWT token configuration (secret, issuer, expiry).
    pub jwt: JwtConfig,
    /// Session lifetime and refresh-token hashing key.
    pub session: SessionConfig,
    /// Credential cookie attributes.
    pub cookies: CookieConfig,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&EnvLookup::process())
    }

    /// Load configuration with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `SESSION_STORE`         | `postgres`                 |
    /// | `DATABASE_URL`          | required for `postgres`    |
    /// | `IDENTITY_EXCHANGE_URL` | **required**               |
    /// | `LOG_FORMAT`            | `text`                     |
    pub fn from_lookup(env: &EnvLookup<'_>) -> Result<Self, ConfigError> {
        let host = env.string_or("HOST", "0.0.0.0");
        let port: u16 = env.parse_or("PORT", 3000)?;

        let cors_origins: Vec<String> = env
            .string_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env.parse_or("REQUEST_TIMEOUT_SECS", 30)?;
        let shutdown_timeout_secs: u64 = env.parse_or("SHUTDOWN_TIMEOUT_SECS", 30)?;

        let store_backend = env.parse_or("SESSION_STORE", StoreBackend::Postgres)?;
        let database_url = env.get("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            store_backend,
            database_url,
            identity_exchange_url: env.required("IDENTITY_EXCHANGE_URL")?,
            log_format: env.parse_or("LOG_FORMAT", LogFormat::Text)?,
            jwt: JwtConfig::from_lookup(env)?,
            session: SessionConfig::from_lookup(env)?,
            cookies: CookieConfig::from_lookup(env)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn load(vars: &HashMap<String, String>) -> Result<ServerConfig, ConfigError> {
        ServerConfig::from_lookup(&EnvLookup::new(|k| vars.get(k).cloned()))
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("JWT_SECRET", "jwt-secret"),
        ("IDENTITY_EXCHANGE_URL", "http://broker.local/exchange"),
        ("REFRESH_HASH_KEY", "refresh-key"),
        ("SESSION_STORE", "memory"),
    ];

    #[test]
    fn defaults_apply_when_only_secrets_set() {
        let config = load(&lookup(&REQUIRED)).expect("config should load");

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.jwt.access_token_expiry_mins, 15);
        assert_eq!(config.jwt.issuer, "quill");
        assert_eq!(config.session.ttl_days, 5);
        assert!(config.cookies.secure);
        assert_eq!(config.identity_exchange_url, "http://broker.local/exchange");
    }

    #[test]
    fn missing_jwt_secret_is_reported() {
        let mut vars = lookup(&REQUIRED);
        vars.remove("JWT_SECRET");
        assert!(matches!(load(&vars), Err(ConfigError::Missing("JWT_SECRET"))));
    }

    #[test]
    fn missing_refresh_key_is_reported() {
        let mut vars = lookup(&REQUIRED);
        vars.remove("REFRESH_HASH_KEY");
        assert!(matches!(load(&vars), Err(ConfigError::Missing("REFRESH_HASH_KEY"))));
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let mut vars = lookup(&REQUIRED);
        vars.remove("SESSION_STORE");
        assert!(matches!(load(&vars), Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn missing_identity_exchange_url_is_reported() {
        let mut vars = lookup(&REQUIRED);
        vars.remove("IDENTITY_EXCHANGE_URL");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Missing("IDENTITY_EXCHANGE_URL"))
        ));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let mut vars = lookup(&REQUIRED);
        vars.insert("PORT".into(), "not-a-port".into());
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { var: "PORT", .. })));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = lookup(&REQUIRED);
        vars.insert("CORS_ORIGINS".into(), "https://a.example, https://b.example,".into());
        vars.insert("COOKIE_SECURE".into(), "false".into());
        vars.insert("SESSION_TTL_DAYS".into(), "2".into());
        vars.insert("LOG_FORMAT".into(), "json".into());

        let config = load(&vars).unwrap();
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert!(!config.cookies.secure);
        assert_eq!(config.session.ttl_days, 2);
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
