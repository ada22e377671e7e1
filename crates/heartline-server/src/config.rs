//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Secrets that ship in examples and must never reach a running server.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "changeme", "secret", "your-secret-here"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    /// Upper bound for `limit` on history reads.
    pub history_limit_max: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HEARTLINE_JWT_SECRET` | (required) |
    /// | `HEARTLINE_DB_PATH` | `heartline.db` |
    /// | `HEARTLINE_HOST` | `0.0.0.0` |
    /// | `HEARTLINE_PORT` | `3000` |
    /// | `HEARTLINE_HISTORY_LIMIT_MAX` | `200` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = get("HEARTLINE_JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingJwtSecret)?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::PlaceholderJwtSecret);
        }

        let db_path = PathBuf::from(get("HEARTLINE_DB_PATH").unwrap_or_else(|| "heartline.db".into()));
        let host = get("HEARTLINE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = get("HEARTLINE_PORT").unwrap_or_else(|| "3000".into());
        let addr = format!("{}:{}", host, port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(format!("{}:{}", host, port)))?;

        let history_limit_max = match get("HEARTLINE_HISTORY_LIMIT_MAX") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidHistoryLimit(raw))?,
            None => 200,
        };

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            history_limit_max,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HEARTLINE_JWT_SECRET environment variable is required")]
    MissingJwtSecret,

    #[error("HEARTLINE_JWT_SECRET is a placeholder value, set a real secret")]
    PlaceholderJwtSecret,

    #[error("invalid listen address '{0}'")]
    InvalidAddr(String),

    #[error("HEARTLINE_HISTORY_LIMIT_MAX must be a positive integer, got '{0}'")]
    InvalidHistoryLimit(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = load(&[("HEARTLINE_JWT_SECRET", "s3cr3t-value")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("heartline.db"));
        assert_eq!(config.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.history_limit_max, 200);
    }

    #[test]
    fn secret_is_required_and_not_a_placeholder() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingJwtSecret)));
        assert!(matches!(
            load(&[("HEARTLINE_JWT_SECRET", "dev-secret-change-me")]),
            Err(ConfigError::PlaceholderJwtSecret)
        ));
    }

    #[test]
    fn bad_values_are_reported() {
        let secret = ("HEARTLINE_JWT_SECRET", "s3cr3t-value");
        assert!(matches!(
            load(&[secret, ("HEARTLINE_PORT", "http")]),
            Err(ConfigError::InvalidAddr(_))
        ));
        assert!(matches!(
            load(&[secret, ("HEARTLINE_HISTORY_LIMIT_MAX", "0")]),
            Err(ConfigError::InvalidHistoryLimit(_))
        ));

        let config = load(&[secret, ("HEARTLINE_HOST", "127.0.0.1"), ("HEARTLINE_PORT", "8080")]).unwrap();
        assert_eq!(config.addr.port(), 8080);
    }
}
