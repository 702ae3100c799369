//! Tool-call dispatch: lookup, validate, invoke, wrap.
//!
//! `dispatch` never fails. Every outcome, including unknown tools and backend errors, comes back
//! as a `CallToolResult` whose `isError` flag tells the caller what happened.

use crate::error::ToolError;
use crate::registry::ToolRegistry;
use crate::validate::validate_arguments;
use rmcp::model::{CallToolResult, Content, Tool};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use unrelated_rest_tools::gateway::RestGateway;

/// One `tools/call` request.
#[derive(Debug, Clone, Default)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Shared by all in-flight calls; cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    gateway: RestGateway,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: ToolRegistry, gateway: RestGateway) -> Self {
        Self {
            registry: Arc::new(registry),
            gateway,
        }
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.registry.list()
    }

    pub async fn dispatch(&self, call: ToolCall) -> CallToolResult {
        let name = call.name;
        match self.try_dispatch(&name, call.arguments).await {
            Ok(value) => {
                debug!(tool = %name, "tool call succeeded");
                let text =
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                CallToolResult::success(vec![Content::text(text)])
            }
            Err(e) => {
                warn!(tool = %name, kind = e.kind(), error = %e, "tool call failed");
                CallToolResult::error(vec![Content::text(e.to_string())])
            }
        }
    }

    async fn try_dispatch(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let entry = self
            .registry
            .lookup(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = validate_arguments(&entry.definition, arguments)?;
        entry.handler.call(&self.gateway, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::{Dispatcher, ToolCall};
    use crate::tools::builtin_registry;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{StatusCode, header};
    use axum::routing::{any, get, post};
    use rmcp::model::{CallToolResult, RawContent};
    use serde_json::{Value, json};
    use std::time::Duration;
    use unrelated_rest_tools::config::RestBackendConfig;
    use unrelated_rest_tools::gateway::RestGateway;
    use unrelated_rest_tools::retry::RetryPolicy;
    use unrelated_test_support::{InFlightCounter, StubServer};

    fn dispatcher(base_url: &str, max_concurrent: usize) -> Dispatcher {
        let mut cfg = RestBackendConfig::new(base_url);
        cfg.rate_limit.max_concurrent = max_concurrent;
        cfg.retry = RetryPolicy {
            initial_interval_ms: 1,
            backoff_coefficient: 1.0,
            maximum_interval_ms: Some(5),
            ..RetryPolicy::default()
        };
        let gateway = RestGateway::new(cfg).expect("gateway");
        Dispatcher::new(builtin_registry().expect("catalog"), gateway)
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new(name, args.as_object().cloned().unwrap_or_default())
    }

    fn text(result: &CallToolResult) -> &str {
        match &result.content[0].raw {
            RawContent::Text(t) => &t.text,
            other => panic!("expected text content, got {other:?}"),
        }
    }

    async fn counting_stub() -> (StubServer, InFlightCounter) {
        let counter = InFlightCounter::default();
        let app = Router::new()
            .route(
                "/{*path}",
                any(|State(counter): State<InFlightCounter>| async move {
                    let _guard = counter.enter();
                    axum::Json(json!({}))
                }),
            )
            .with_state(counter.clone());
        (StubServer::spawn(app).await.expect("stub"), counter)
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result_without_backend_calls() {
        let (stub, counter) = counting_stub().await;
        let d = dispatcher(stub.base_url(), 4);

        let result = d.dispatch(call("frobnicate", json!({}))).await;
        assert_eq!(result.is_error, Some(true));
        assert_eq!(text(&result), "Unknown tool: frobnicate");
        assert_eq!(counter.total(), 0);
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_backend() {
        let (stub, counter) = counting_stub().await;
        let d = dispatcher(stub.base_url(), 4);

        let result = d.dispatch(call("create", json!({"path": "/users"}))).await;
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).contains("body"));

        let result = d.dispatch(call("fetch", json!({"path": 42}))).await;
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).contains("'path' must be of type string"));

        assert_eq!(counter.total(), 0);
    }

    #[tokio::test]
    async fn fetch_returns_pretty_printed_json() {
        let app = Router::new().route(
            "/users",
            get(|| async { axum::Json(json!({"id": 1, "name": "Ann"})) }),
        );
        let stub = StubServer::spawn(app).await.expect("stub");
        let d = dispatcher(stub.base_url(), 4);

        let result = d.dispatch(call("fetch", json!({"path": "/users"}))).await;
        assert_eq!(result.is_error, Some(false));
        assert_eq!(text(&result), "{\n  \"id\": 1,\n  \"name\": \"Ann\"\n}");

        stub.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn create_returns_echoed_body_verbatim_on_201() {
        let app = Router::new().route(
            "/users",
            post(|body: Bytes| async move {
                (StatusCode::CREATED, [(header::CONTENT_TYPE, "application/json")], body)
            }),
        );
        let stub = StubServer::spawn(app).await.expect("stub");
        let d = dispatcher(stub.base_url(), 4);

        let args = json!({"path": "/users", "body": {"name": "John"}});
        let result = d.dispatch(call("create", args)).await;
        assert_eq!(result.is_error, Some(false));
        assert_eq!(text(&result), "{\n  \"name\": \"John\"\n}");

        stub.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn backend_failure_becomes_error_result() {
        let counter = InFlightCounter::default();
        let app = Router::new()
            .route(
                "/boom",
                get(|State(counter): State<InFlightCounter>| async move {
                    let _guard = counter.enter();
                    (StatusCode::INTERNAL_SERVER_ERROR, "kaput")
                }),
            )
            .with_state(counter.clone());
        let stub = StubServer::spawn(app).await.expect("stub");
        let d = dispatcher(stub.base_url(), 4);

        let result = d.dispatch(call("fetch", json!({"path": "/boom"}))).await;
        assert_eq!(result.is_error, Some(true));
        assert!(text(&result).contains("500"));
        assert!(text(&result).contains("kaput"));
        assert_eq!(counter.total(), 3);

        stub.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn concurrent_dispatch_respects_admission_limit() {
        let counter = InFlightCounter::default();
        let app = Router::new()
            .route(
                "/items/{id}",
                get(|State(counter): State<InFlightCounter>| async move {
                    let _guard = counter.enter();
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    axum::Json(json!({"ok": true}))
                }),
            )
            .with_state(counter.clone());
        let stub = StubServer::spawn(app).await.expect("stub");
        let d = dispatcher(stub.base_url(), 2);

        let calls = (0..6).map(|i| {
            let d = d.clone();
            async move { d.dispatch(call("fetch", json!({"path": format!("/items/{i}")}))).await }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_error == Some(false)));
        assert_eq!(counter.total(), 6);
        assert!(counter.peak() <= 2, "peak in-flight was {}", counter.peak());

        stub.shutdown().await.expect("shutdown");
    }
}
