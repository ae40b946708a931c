//! Console configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clinic_api::ApiConfig;

/// Base URL of the REST backend.
pub const ENV_API_URL: &str = "CLINIC_API_URL";
/// Where the session is persisted. Unset keeps it in memory.
pub const ENV_SESSION_FILE: &str = "CLINIC_SESSION_FILE";
/// Per-request timeout in whole seconds.
pub const ENV_HTTP_TIMEOUT_SECS: &str = "CLINIC_HTTP_TIMEOUT_SECS";

/// Settings for a [`Console`](crate::Console).
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    pub api: ApiConfig,
    /// Session file. `None` keeps the session in memory only.
    pub store_path: Option<PathBuf>,
    /// Where unauthenticated users are sent.
    pub login_path: String,
    /// Where signed-in users land after visiting the login screen.
    pub home_path: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            store_path: None,
            login_path: "/login".to_string(),
            home_path: "/center".to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Reads `CLINIC_API_URL`, `CLINIC_SESSION_FILE` and
    /// `CLINIC_HTTP_TIMEOUT_SECS`, falling back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// Empty values count as unset. An unparsable timeout is ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let timeout = match var(ENV_HTTP_TIMEOUT_SECS) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %raw, "ignoring invalid {ENV_HTTP_TIMEOUT_SECS}");
                    defaults.api.timeout
                }
            },
            None => defaults.api.timeout,
        };

        Self {
            api: ApiConfig {
                base_url: var(ENV_API_URL).unwrap_or(defaults.api.base_url),
                timeout,
            },
            store_path: var(ENV_SESSION_FILE).map(PathBuf::from),
            ..defaults
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn with_routes(mut self, login_path: impl Into<String>, home_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self.home_path = home_path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = ConsoleConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.api.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_from_lookup_reads_every_variable() {
        let config = ConsoleConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://clinic.example"),
            (ENV_SESSION_FILE, "/var/lib/clinic/session.json"),
            (ENV_HTTP_TIMEOUT_SECS, "12"),
        ]));

        assert_eq!(config.api.base_url, "https://clinic.example");
        assert_eq!(config.api.timeout, Duration::from_secs(12));
        assert_eq!(
            config.store_path,
            Some(PathBuf::from("/var/lib/clinic/session.json"))
        );
    }

    #[test]
    fn test_from_lookup_bad_timeout_falls_back() {
        for bad in ["soon", "0", "-3"] {
            let config = ConsoleConfig::from_lookup(lookup(&[(ENV_HTTP_TIMEOUT_SECS, bad)]));
            assert_eq!(config.api.timeout, ApiConfig::default().timeout);
        }
    }

    #[test]
    fn test_from_lookup_blank_values_are_unset() {
        let config = ConsoleConfig::from_lookup(lookup(&[(ENV_SESSION_FILE, "  ")]));
        assert_eq!(config.store_path, None);
    }
}
