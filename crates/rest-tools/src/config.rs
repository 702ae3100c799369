//! Configuration for the REST backend a bridge instance talks to.
//!
//! One running instance has exactly one backend: one base URL, one credential, one rate budget
//! and one cache TTL. The bundle is immutable once handed to `RestGateway::new`.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default per-request timeout when neither config nor caller overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestBackendConfig {
    /// Base URL every tool path is resolved against.
    ///
    /// May be left out of a config file when the caller supplies it separately; an empty value
    /// is rejected by `RestGateway::new`.
    #[serde(default)]
    pub base_url: String,

    /// Authentication applied to every outbound request.
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub defaults: EndpointDefaults,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Maximum response body size (bytes). `None` = unlimited.
    #[serde(default)]
    pub max_response_bytes: Option<usize>,
}

impl RestBackendConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
            defaults: EndpointDefaults::default(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
            max_response_bytes: None,
        }
    }

    /// Effective timeout for a call, given an optional per-call override.
    ///
    /// `defaults.timeout = 0` disables the timeout unless the caller sets one.
    #[must_use]
    pub fn effective_timeout(&self, per_call: Option<Duration>) -> Option<Duration> {
        if let Some(t) = per_call.filter(|t| !t.is_zero()) {
            return Some(t);
        }
        match self.defaults.timeout {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_TIMEOUT),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    None,
    Bearer { token: String },
    Header { name: String, value: String },
    Basic { username: String, password: String },
    Query { name: String, value: String },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDefaults {
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request timeout in seconds (0 = none).
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Process-wide admission budget for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
    /// Maximum number of HTTP calls in flight at once.
    pub max_concurrent: usize,
    /// Minimum spacing between the starts of two consecutive calls.
    pub min_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            min_interval_ms: 0,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// TTL for cached GET responses (0 = caching disabled).
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, DEFAULT_TIMEOUT, RestBackendConfig};
    use std::time::Duration;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let cfg: RestBackendConfig =
            serde_json::from_str(r#"{"baseUrl": "https://api.example.com"}"#).expect("config");
        assert_eq!(cfg.base_url, "https://api.example.com");
        assert_eq!(cfg.rate_limit.max_concurrent, 4);
        assert_eq!(cfg.cache.ttl_secs, 300);
        assert_eq!(cfg.retry.maximum_attempts, 3);
        assert!(cfg.auth.is_none());
    }

    #[test]
    fn parses_tagged_auth() {
        let cfg: RestBackendConfig = serde_json::from_str(
            r#"{
                "baseUrl": "https://api.example.com",
                "auth": {"type": "header", "name": "X-Api-Key", "value": "k"},
                "rateLimit": {"maxConcurrent": 2, "minIntervalMs": 50},
                "cache": {"ttlSecs": 0}
            }"#,
        )
        .expect("config");
        assert_eq!(
            cfg.auth,
            Some(AuthConfig::Header {
                name: "X-Api-Key".to_string(),
                value: "k".to_string()
            })
        );
        assert_eq!(cfg.rate_limit.max_concurrent, 2);
        assert_eq!(cfg.rate_limit.min_interval(), Duration::from_millis(50));
        assert!(cfg.cache.ttl().is_zero());
    }

    #[test]
    fn effective_timeout_prefers_per_call_override() {
        let mut cfg = RestBackendConfig::new("http://localhost");
        assert_eq!(cfg.effective_timeout(None), Some(DEFAULT_TIMEOUT));
        assert_eq!(
            cfg.effective_timeout(Some(Duration::from_millis(250))),
            Some(Duration::from_millis(250))
        );

        cfg.defaults.timeout = Some(0);
        assert_eq!(cfg.effective_timeout(None), None);

        cfg.defaults.timeout = Some(5);
        assert_eq!(cfg.effective_timeout(None), Some(Duration::from_secs(5)));
    }
}
