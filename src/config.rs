//! Runtime configuration for the MyRecipe client.
//!
//! Values come from the process environment (after `.env` is loaded by the
//! binary) and can be overridden by CLI flags.

use std::time::Duration;

/// Used when neither `MYRECIPE_API_URL` nor `EXPO_PUBLIC_API_BASE_URL` is set.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Applies to every request, the refresh exchange included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: String,
    pub timeout: Duration,
    /// Keychain service name the tokens are stored under.
    pub keychain_service: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            keychain_service: crate::api::credentials::SERVICE_NAME.to_string(),
        }
    }
}

impl Config {
    /// Read configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// API base URL: MYRECIPE_API_URL > EXPO_PUBLIC_API_BASE_URL > localhost default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(url) = lookup("MYRECIPE_API_URL")
            .or_else(|| lookup("EXPO_PUBLIC_API_BASE_URL"))
            .filter(|url| !url.trim().is_empty())
        {
            config.api_base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup("MYRECIPE_API_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => log::warn!(
                    "Ignoring invalid MYRECIPE_API_TIMEOUT_SECS={:?}, using {}s",
                    raw,
                    DEFAULT_TIMEOUT.as_secs()
                ),
            }
        }

        if let Some(service) = lookup("MYRECIPE_KEYCHAIN_SERVICE").filter(|s| !s.is_empty()) {
            config.keychain_service = service;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_api_url_precedence() {
        let config = Config::from_lookup(lookup(&[
            ("MYRECIPE_API_URL", "https://api.myrecipe.app"),
            ("EXPO_PUBLIC_API_BASE_URL", "http://10.0.2.2:8080"),
        ]));
        assert_eq!(config.api_base_url, "https://api.myrecipe.app");

        let config = Config::from_lookup(lookup(&[("EXPO_PUBLIC_API_BASE_URL", "http://10.0.2.2:8080")]));
        assert_eq!(config.api_base_url, "http://10.0.2.2:8080");
    }

    #[test]
    fn test_invalid_timeout_keeps_default() {
        let config = Config::from_lookup(lookup(&[("MYRECIPE_API_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);

        let config = Config::from_lookup(lookup(&[("MYRECIPE_API_TIMEOUT_SECS", "0")]));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);

        let config = Config::from_lookup(lookup(&[("MYRECIPE_API_TIMEOUT_SECS", "30")]));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
