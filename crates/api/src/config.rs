//! Process configuration, read once at startup.

use std::net::{Ipv4Addr, SocketAddr};

use chrono::Duration;
use thiserror::Error;

use teamgate_auth::{SigningKeyError, TokenService, DEFAULT_TOKEN_TTL_HOURS};
use teamgate_observability::LogFormat;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub port: u16,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub token_ttl: Duration,
    pub log_format: LogFormat,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("token_ttl", &self.token_ttl)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Read from the process environment. Call `dotenvy::dotenv()` first to
    /// pick up a local `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = present("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let port = match present("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "PORT",
                message: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let token_ttl = match present("TOKEN_TTL_HOURS") {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(hours) if hours > 0 => {
                    Duration::try_hours(hours).ok_or_else(|| ConfigError::Invalid {
                        var: "TOKEN_TTL_HOURS",
                        message: "out of range".to_string(),
                    })?
                }
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        var: "TOKEN_TTL_HOURS",
                        message: "must be positive".to_string(),
                    });
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: "TOKEN_TTL_HOURS",
                        message: e.to_string(),
                    });
                }
            },
            None => Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        };

        let log_format = match present("LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>().map_err(|message| ConfigError::Invalid {
                var: "LOG_FORMAT",
                message,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            jwt_secret,
            port,
            database_url: present("DATABASE_URL"),
            token_ttl,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn token_service(&self) -> Result<TokenService, SigningKeyError> {
        TokenService::with_ttl(self.jwt_secret.as_bytes(), self.token_ttl)
    }
}
