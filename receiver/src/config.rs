//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup. A missing webhook secret is not fatal
//! here: the server still starts and every webhook is answered with a
//! configuration error until the secret is provided.

use std::env;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

/// Default symmetric window, in seconds, for webhook timestamps.
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Shared webhook signing secret (raw or `whsec_`-prefixed base64)
    pub webhook_secret: Option<String>,

    /// Maximum allowed distance in seconds between a webhook timestamp and now
    pub webhook_tolerance_secs: u64,

    /// Base URL of the account service; the in-memory store is used when unset
    pub account_store_url: Option<String>,

    /// HTTP request timeout for account service calls in milliseconds
    pub account_store_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_or("PORT", 8080),

            webhook_secret: non_empty("WEBHOOK_SECRET"),

            webhook_tolerance_secs: parse_or("WEBHOOK_TOLERANCE_SECS", DEFAULT_TOLERANCE_SECS),

            account_store_url: non_empty("ACCOUNT_STORE_URL"),

            account_store_timeout_ms: parse_or("ACCOUNT_STORE_TIMEOUT_MS", 8000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            webhook_secret: None,
            webhook_tolerance_secs: DEFAULT_TOLERANCE_SECS,
            account_store_url: None,
            account_store_timeout_ms: 8000,
        }
    }
}

// The secret never reaches the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("webhook_secret_set", &self.webhook_secret.is_some())
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("account_store_url", &self.account_store_url)
            .field("account_store_timeout_ms", &self.account_store_timeout_ms)
            .finish()
    }
}

/// Parse a variable into `T`, falling back to `default` when unset or invalid.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_valid() {
        env::set_var("TEST_ACCOUNTSYNC_PORT", "9090");
        let result: u16 = parse_or("TEST_ACCOUNTSYNC_PORT", 0);
        assert_eq!(result, 9090);
        env::remove_var("TEST_ACCOUNTSYNC_PORT");
    }

    #[test]
    fn test_parse_or_invalid_uses_default() {
        env::set_var("TEST_ACCOUNTSYNC_TOLERANCE", "five minutes");
        let result: u64 = parse_or("TEST_ACCOUNTSYNC_TOLERANCE", 300);
        assert_eq!(result, 300);
        env::remove_var("TEST_ACCOUNTSYNC_TOLERANCE");
    }

    #[test]
    fn test_parse_or_default() {
        let result: u64 = parse_or("NONEXISTENT_ACCOUNTSYNC_VAR", 42);
        assert_eq!(result, 42);
    }

    #[test]
    fn test_non_empty_blank_is_unset() {
        env::set_var("TEST_ACCOUNTSYNC_BLANK", "   ");
        assert_eq!(non_empty("TEST_ACCOUNTSYNC_BLANK"), None);
        env::remove_var("TEST_ACCOUNTSYNC_BLANK");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config {
            webhook_secret: Some("whsec_c2VjcmV0".to_string()),
            ..Config::default()
        };
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("webhook_secret_set: true"));
        assert!(!rendered.contains("whsec_"));
    }
}
