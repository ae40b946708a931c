//! Connection settings for the backend.

use std::time::Duration;

/// Where the backend lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Scheme + host (+ optional prefix), e.g. `http://localhost:8000`.
    /// A trailing slash is ignored.
    pub base_url: String,

    /// Per-request timeout, covering connect through reading the body.
    ///
    /// Default: 30 seconds.
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Config for `base_url` with default timeouts.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// `base_url` + `path`, with exactly one slash between them.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}
