//! Configuration loading and representation.
//!
//! Everything comes from the process environment; a `.env` file in the working
//! directory is loaded first when present.

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEV_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 480;
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is required")]
    Missing { name: &'static str },

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Database settings (only used with persistent stores).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub session_ttl_minutes: i64,
    pub cookie_secure: bool,
    /// `None` selects the in-memory store.
    pub database: Option<DatabaseConfig>,
}

impl AppConfig {
    /// Load from the process environment (after reading `.env`, if any).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = parse_or(var("BIND_ADDR"), "BIND_ADDR", DEFAULT_BIND_ADDR.parse::<SocketAddr>())?;

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let session_ttl_minutes = parse_or(
            var("SESSION_TTL_MINUTES"),
            "SESSION_TTL_MINUTES",
            Ok::<_, std::num::ParseIntError>(DEFAULT_SESSION_TTL_MINUTES),
        )?;
        if session_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_TTL_MINUTES",
                value: session_ttl_minutes.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let cookie_secure = parse_bool(var("COOKIE_SECURE"), "COOKIE_SECURE")?;

        let database = if parse_bool(var("USE_PERSISTENT_STORES"), "USE_PERSISTENT_STORES")? {
            let url = var("DATABASE_URL").ok_or(ConfigError::Missing { name: "DATABASE_URL" })?;
            let max_connections = parse_or(
                var("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                Ok::<_, std::num::ParseIntError>(DEFAULT_DATABASE_MAX_CONNECTIONS),
            )?;
            Some(DatabaseConfig { url, max_connections })
        } else {
            None
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            session_ttl_minutes,
            cookie_secure,
            database,
        })
    }

    /// In-memory configuration for tests and local runs.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            cookie_secure: false,
            database: None,
        }
    }
}

fn parse_or<T, E>(raw: Option<String>, name: &'static str, default: Result<T, E>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
    E: ToString,
{
    match raw {
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
        None => default.map_err(|e| ConfigError::Invalid {
            name,
            value: String::new(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(raw: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            value: other.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_select_the_in_memory_store() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.session_ttl_minutes, 480);
        assert!(!config.cookie_secure);
        assert_eq!(config.database, None);
    }

    #[test]
    fn persistent_stores_require_a_database_url() {
        let err = load(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing { name: "DATABASE_URL" });

        let config = load(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/billdesk"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ])
        .unwrap();
        assert_eq!(
            config.database,
            Some(DatabaseConfig {
                url: "postgres://localhost/billdesk".into(),
                max_connections: 12,
            })
        );
    }

    #[test]
    fn malformed_values_are_reported_by_name() {
        for (name, value) in [
            ("BIND_ADDR", "nowhere"),
            ("SESSION_TTL_MINUTES", "soon"),
            ("SESSION_TTL_MINUTES", "0"),
            ("COOKIE_SECURE", "maybe"),
        ] {
            match load(&[(name, value)]).unwrap_err() {
                ConfigError::Invalid { name: reported, .. } => assert_eq!(reported, name),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }
}
