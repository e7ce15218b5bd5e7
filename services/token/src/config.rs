//! Centralized configuration for the token service.
//!
//! All configuration is loaded from environment variables (optionally seeded
//! from a `.env` file) and validated at startup.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Minimum HMAC secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Configuration loading failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required variable is not set
    #[error("missing required variable {0}")]
    Missing(&'static str),

    /// Variable is set but unusable
    #[error("invalid {name}: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// What is wrong with the value
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    /// Local development
    Dev,
    /// Automated test runs
    Test,
    /// Production
    Prod,
}

impl FromStr for AppEnv {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Self::Dev),
            "test" => Ok(Self::Test),
            "prod" => Ok(Self::Prod),
            other => Err(ConfigError::invalid("APP_ENV", format!("{other:?}"))),
        }
    }
}

impl AppEnv {
    /// Value as written in `APP_ENV`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Prod => "prod",
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token service configuration.
#[derive(Clone)]
pub struct Config {
    /// Deployment environment
    pub env: AppEnv,

    // Server settings
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Grace period for in-flight requests on shutdown
    pub shutdown_timeout: Duration,

    // Token settings
    /// Issuer claim
    pub jwt_issuer: String,
    /// HMAC secret for access tokens
    pub access_token_secret: Vec<u8>,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// HMAC secret for refresh tokens
    pub refresh_token_secret: Vec<u8>,
    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,

    // Database
    /// Postgres connection string
    pub database_url: String,
    /// Pool size
    pub database_max_connections: u32,

    /// Recipient of origin-anomaly alerts
    pub alert_recipient: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = lookup("APP_ENV")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or(AppEnv::Dev);

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_var(&lookup, "PORT", 8080)?;
        if port == 0 {
            return Err(ConfigError::invalid("PORT", "must be in 1..=65535"));
        }
        let shutdown_timeout = Duration::from_secs(parse_var(&lookup, "SHUTDOWN_TIMEOUT", 5)?);

        let jwt_issuer = lookup("JWT_ISSUER").unwrap_or_else(|| "auth-service".to_string());
        let access_token_secret = required_secret(&lookup, "ACCESS_TOKEN_SECRET")?;
        let refresh_token_secret = required_secret(&lookup, "REFRESH_TOKEN_SECRET")?;
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::invalid(
                "REFRESH_TOKEN_SECRET",
                "must differ from ACCESS_TOKEN_SECRET",
            ));
        }
        let access_token_ttl = positive_secs(&lookup, "ACCESS_TOKEN_TTL", 900)?;
        let refresh_token_ttl = positive_secs(&lookup, "REFRESH_TOKEN_TTL", 604_800)?;

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let database_max_connections = parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let alert_recipient =
            lookup("ALERT_RECIPIENT").unwrap_or_else(|| "security-alerts@example.com".to_string());

        Ok(Self {
            env,
            host,
            port,
            shutdown_timeout,
            jwt_issuer,
            access_token_secret,
            access_token_ttl,
            refresh_token_secret,
            refresh_token_ttl,
            database_url,
            database_max_connections,
            alert_recipient,
        })
    }

    /// `host:port` bind address.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("env", &self.env)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("database_max_connections", &self.database_max_connections)
            .field("alert_recipient", &self.alert_recipient)
            .finish_non_exhaustive()
    }
}

/// Parse variable with default value.
fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        Some(val) => val.parse().map_err(|e| ConfigError::invalid(name, format!("{e}"))),
        None => Ok(default),
    }
}

fn positive_secs<F>(lookup: &F, name: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_var(lookup, name, default)?;
    if secs == 0 {
        return Err(ConfigError::invalid(name, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

fn required_secret<F>(lookup: &F, name: &'static str) -> Result<Vec<u8>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = lookup(name).ok_or(ConfigError::Missing(name))?.into_bytes();
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::invalid(
            name,
            format!("must be at least {MIN_SECRET_LEN} bytes"),
        ));
    }
    Ok(secret)
}
