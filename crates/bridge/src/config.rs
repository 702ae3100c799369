//! Command line and config-file handling for the bridge binary.

use crate::logging::LogFormat;
use anyhow::Context as _;
use clap::Parser;
use std::path::{Path, PathBuf};
use unrelated_rest_tools::config::{AuthConfig, RestBackendConfig};

#[derive(Debug, Parser)]
#[command(
    name = "unrelated-mcp-rest-bridge",
    version,
    about = "Expose a REST API as MCP tools over stdio"
)]
pub struct Cli {
    /// YAML file with the backend configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base URL of the REST API (overrides `baseUrl` from the config file).
    #[arg(long, env = "REST_BRIDGE_BASE_URL")]
    pub base_url: Option<String>,

    /// API key sent as `Authorization: Bearer <key>` (overrides `auth` from the config file).
    #[arg(long, env = "REST_BRIDGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Maximum number of HTTP calls in flight at once.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Minimum spacing between HTTP call starts, in milliseconds.
    #[arg(long)]
    pub min_interval_ms: Option<u64>,

    /// TTL for cached GET responses, in seconds (0 disables caching).
    #[arg(long)]
    pub cache_ttl_secs: Option<u64>,

    /// Default request timeout, in seconds (0 disables the timeout).
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Maximum attempts per call, including the first one.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Merge the config file (if any) with command line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if no base URL is
    /// configured anywhere.
    pub fn resolve(&self) -> anyhow::Result<RestBackendConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_config_file(path)?,
            None => RestBackendConfig::new(""),
        };

        if let Some(base_url) = &self.base_url {
            cfg.base_url.clone_from(base_url);
        }
        if cfg.base_url.trim().is_empty() {
            anyhow::bail!(
                "missing base URL: pass --base-url, set REST_BRIDGE_BASE_URL or set baseUrl in the config file"
            );
        }

        if let Some(token) = &self.api_key {
            cfg.auth = Some(AuthConfig::Bearer {
                token: token.clone(),
            });
        }
        if let Some(n) = self.max_concurrent {
            cfg.rate_limit.max_concurrent = n;
        }
        if let Some(ms) = self.min_interval_ms {
            cfg.rate_limit.min_interval_ms = ms;
        }
        if let Some(secs) = self.cache_ttl_secs {
            cfg.cache.ttl_secs = secs;
        }
        if let Some(secs) = self.timeout_secs {
            cfg.defaults.timeout = Some(secs);
        }
        if let Some(n) = self.max_attempts {
            cfg.retry.maximum_attempts = n;
        }

        Ok(cfg)
    }
}

/// Load a `RestBackendConfig` from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid config.
pub fn load_config_file(path: &Path) -> anyhow::Result<RestBackendConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: RestBackendConfig =
        serde_yaml::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
