//! Configuration parsed from environment variables.

use std::net::IpAddr;
use std::path::PathBuf;

pub const DEFAULT_PROFILES_TABLE: &str = "perfiles_usuarios";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project base URL without trailing slash, e.g. `https://abc.supabase.co`.
    pub url: String,
    pub anon_key: String,
    pub profiles_table: String,
    /// Where the session tokens are kept between runs. `None` keeps them in memory only.
    pub session_file: Option<PathBuf>,
    pub timeouts: Timeouts,
}

impl BackendConfig {
    /// Build typed backend config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `GAMBITO_PROFILES_TABLE`: default `perfiles_usuarios`
    /// - `GAMBITO_SESSION_FILE`: persist session tokens to this path
    /// - `GAMBITO_REQUEST_TIMEOUT_SECS`: default 30
    /// - `GAMBITO_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Same as [`BackendConfig::from_env`] but reading from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or a value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = required(&lookup, "SUPABASE_URL")?
            .trim_end_matches('/')
            .to_owned();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid { var: "SUPABASE_URL", value: url });
        }
        let anon_key = required(&lookup, "SUPABASE_ANON_KEY")?;
        let profiles_table = non_empty(&lookup, "GAMBITO_PROFILES_TABLE")
            .unwrap_or_else(|| DEFAULT_PROFILES_TABLE.to_owned());
        let session_file = non_empty(&lookup, "GAMBITO_SESSION_FILE").map(PathBuf::from);
        let timeouts = Timeouts {
            request_secs: parse_or(&lookup, "GAMBITO_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_or(&lookup, "GAMBITO_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        Ok(Self { url, anon_key, profiles_table, session_file, timeouts })
    }
}

/// Where the local HTTP surface listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
}

impl ServerConfig {
    /// Read `BIND_ADDR` (default `127.0.0.1`) and `PORT` (default 3000).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if either value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] if either value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let default_addr: IpAddr = DEFAULT_BIND_ADDR
            .parse()
            .map_err(|_| ConfigError::Invalid { var: "BIND_ADDR", value: DEFAULT_BIND_ADDR.to_owned() })?;
        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", default_addr)?,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    lookup(var)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<String, ConfigError> {
    non_empty(lookup, var).ok_or(ConfigError::Missing(var))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match non_empty(lookup, var) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
