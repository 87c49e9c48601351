//! Process configuration, read from environment variables.
//!
//! Empty values count as unset. Parsing goes through [`AppConfig::from_lookup`]
//! so it can be exercised without touching the process environment.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ROLE_REFRESH_SECS: u64 = 5;
const DEFAULT_SESSION_TTL_SECS: u64 = 900;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),

    #[error("environment variable {var} is not a valid number: {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("invalid DB_SSL_MODE {0:?} (expected disable, require, verify-ca or verify-full)")]
    InvalidSslMode(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error(
        "BOOTSTRAP_ADMIN_EMAIL is set but BOOTSTRAP_ADMIN_PASSWORD or BOOTSTRAP_ADMIN_NAME is missing"
    )]
    IncompleteBootstrap,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SslMode {
    #[default]
    Disable,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "disable" => Ok(SslMode::Disable),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(ConfigError::InvalidSslMode(other.to_string())),
        }
    }

    fn to_pg(self) -> PgSslMode {
        match self {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub ssl_mode: SslMode,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
            .ssl_mode(self.ssl_mode.to_pg())
    }
}

impl core::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub public_url: String,
    pub admin_url: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl: Duration,
}

impl core::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Admin account created at startup when configured.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl core::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub log_level: Option<String>,
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub session: SessionConfig,
    pub role_refresh_interval: Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database = DatabaseConfig {
            user: env.required("DB_USER")?,
            password: env.optional("DB_PASSWORD").unwrap_or_default(),
            host: env
                .optional("DB_HOST")
                .unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            port: env.number("DB_PORT", DEFAULT_DB_PORT)?,
            name: env.required("DB_NAME")?,
            ssl_mode: match env.optional("DB_SSL_MODE") {
                Some(mode) => SslMode::parse(&mode)?,
                None => SslMode::default(),
            },
            max_connections: env.number("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
        };

        let provider = ProviderConfig {
            public_url: env.required("KRATOS_PUBLIC_URL")?,
            admin_url: env.required("KRATOS_ADMIN_URL")?,
        };

        let session = SessionConfig {
            secret: env.required("JWT_SECRET")?,
            ttl: Duration::from_secs(env.positive("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?),
        };

        let bootstrap_admin = match env.optional("BOOTSTRAP_ADMIN_EMAIL") {
            None => None,
            Some(email) => {
                let password = env.optional("BOOTSTRAP_ADMIN_PASSWORD");
                let name = env.optional("BOOTSTRAP_ADMIN_NAME");
                match (password, name) {
                    (Some(password), Some(name)) => Some(BootstrapAdmin {
                        email,
                        name,
                        password,
                    }),
                    _ => return Err(ConfigError::IncompleteBootstrap),
                }
            }
        };

        Ok(Self {
            port: env.number("PORT", DEFAULT_PORT)?,
            log_level: env.optional("LOG_LEVEL"),
            database,
            provider,
            session,
            role_refresh_interval: Duration::from_secs(
                env.positive("ROLE_REFRESH_INTERVAL_SECS", DEFAULT_ROLE_REFRESH_SECS)?,
            ),
            bootstrap_admin,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn number<N: core::str::FromStr>(&self, key: &'static str, default: N) -> Result<N, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                var: key,
                value: raw,
            }),
        }
    }

    fn positive(&self, key: &'static str, default: u64) -> Result<u64, ConfigError> {
        match self.number(key, default)? {
            0 => Err(ConfigError::Zero(key)),
            n => Ok(n),
        }
    }
}
