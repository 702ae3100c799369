//! Expose a REST API as a fixed catalog of MCP tools.
//!
//! [`tools::builtin_registry`] declares the tools, [`dispatcher::Dispatcher`] validates and runs
//! calls against a shared [`RestGateway`], and [`session::serve`] speaks the protocol over a
//! line-delimited stream.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod registry;
pub mod session;
pub mod tools;
pub mod validate;

use anyhow::Context as _;
use dispatcher::Dispatcher;
use tracing::info;
use unrelated_rest_tools::config::RestBackendConfig;
use unrelated_rest_tools::gateway::RestGateway;

/// Build the gateway and the built-in tool catalog for `config`.
///
/// # Errors
///
/// Returns an error if the backend config is unusable (e.g. an invalid base URL).
pub fn build_dispatcher(config: RestBackendConfig) -> anyhow::Result<Dispatcher> {
    let gateway = RestGateway::new(config).context("build REST gateway")?;
    let registry = tools::builtin_registry().context("build tool registry")?;

    let cfg = gateway.config();
    info!(
        base_url = %gateway.redacted_base_url(),
        tools = registry.len(),
        max_concurrent = cfg.rate_limit.max_concurrent,
        cache_ttl_secs = cfg.cache.ttl_secs,
        "REST bridge ready"
    );

    Ok(Dispatcher::new(registry, gateway))
}
