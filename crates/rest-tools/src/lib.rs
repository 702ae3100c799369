//! REST gateway runtime shared by the MCP REST bridge.
//!
//! This crate owns everything that touches the outbound HTTP backend:
//! - `gateway`: verb-level REST operations (fetch/create/replace/remove)
//! - `limiter`: process-wide admission control for outbound calls
//! - `cache`: TTL cache for idempotent reads
//! - `retry`: backoff policy for transient failures
//!
//! It intentionally contains **no** MCP protocol handling and **no** tool catalog.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod limiter;
pub mod retry;
pub mod safety;
pub mod semantics;
