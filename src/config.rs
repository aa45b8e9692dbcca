//! Environment-driven configuration.
//!
//! Every option has a default; the service starts with zero variables
//! set and degrades the pro tier to fallback-only when no credential is
//! configured.

use std::env;
use std::time::Duration;

pub const DEFAULT_MODELS: &[&str] = &[
    "meta-llama/llama-3.1-8b-instruct:free",
    "mistralai/mistral-7b-instruct:free",
    "google/gemma-2-9b-it:free",
];

#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// External API credential; absence degrades the pro tier to
    /// fallback-only rather than erroring at request time.
    pub api_key: Option<String>,
    /// Base URL of the OpenRouter-compatible completion API.
    pub base_url: String,
    /// Ordered candidate models, most preferred first.
    pub models: Vec<String>,
    /// Per-attempt network timeout.
    pub request_timeout: Duration,
    /// Max requests per client per window.
    pub rate_limit_max: usize,
    /// Sliding-window length.
    pub rate_limit_window: Duration,
    /// Allowed CORS origins; empty means permissive.
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            request_timeout: Duration::from_secs(30),
            rate_limit_max: crate::limiter::DEFAULT_MAX_REQUESTS,
            rate_limit_window: crate::limiter::DEFAULT_WINDOW,
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration with env-over-default priority.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            host: env_or("HOST", defaults.host),
            port: parse_or("PORT", defaults.port),
            api_key: env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: env_or("OPENROUTER_BASE_URL", defaults.base_url),
            models: env::var("OPENROUTER_MODELS")
                .ok()
                .map(|raw| parse_list(&raw))
                .filter(|models| !models.is_empty())
                .unwrap_or(defaults.models),
            request_timeout: Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECS", 30)),
            rate_limit_max: parse_or("RATE_LIMIT_MAX", defaults.rate_limit_max),
            rate_limit_window: Duration::from_secs(parse_or(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window.as_secs(),
            )),
            cors_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Split a comma-separated override, dropping empty segments. A value
/// of `*` collapses to empty, which callers treat as permissive.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "*")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_parsing_trims_and_drops_empties() {
        assert_eq!(
            parse_list(" a/b:free , c/d ,, "),
            vec!["a/b:free".to_string(), "c/d".to_string()]
        );
        assert!(parse_list("*").is_empty());
    }

    #[test]
    fn defaults_carry_the_builtin_candidate_list() {
        let config = Config::default();
        assert_eq!(config.models.len(), DEFAULT_MODELS.len());
        assert_eq!(config.rate_limit_max, 30);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert!(config.api_key.is_none());
    }
}
