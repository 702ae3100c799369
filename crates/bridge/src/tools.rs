//! Built-in tool catalog: one tool per REST verb.

use crate::error::{RegistryError, ToolError};
use crate::registry::{ParamSpec, ParamType, ToolDefinition, ToolHandler, ToolRegistry};
use crate::validate::ValidatedArgs;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use unrelated_rest_tools::gateway::{RestGateway, RestRequest};
use unrelated_rest_tools::semantics::{Verb, annotations_for_verb};

/// Build the registry with `fetch`, `create`, `replace` and `remove`.
///
/// # Errors
///
/// Only fails if the static catalog itself is inconsistent (duplicate names).
pub fn builtin_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();

    registry.register(
        verb_tool(
            "fetch",
            Verb::Get,
            "Read a resource from the REST API (GET). Results are cached briefly; identical reads \
             within the cache window are served without contacting the API.",
        )
        .param(query_param()),
        VerbTool { verb: Verb::Get },
    )?;

    registry.register(
        verb_tool(
            "create",
            Verb::Post,
            "Create a resource in the REST API (POST) with a JSON body.",
        )
        .param(body_param()),
        VerbTool { verb: Verb::Post },
    )?;

    registry.register(
        verb_tool(
            "replace",
            Verb::Put,
            "Replace a resource in the REST API (PUT) with a JSON body.",
        )
        .param(body_param()),
        VerbTool { verb: Verb::Put },
    )?;

    registry.register(
        verb_tool(
            "remove",
            Verb::Delete,
            "Delete a resource from the REST API (DELETE).",
        )
        .param(query_param()),
        VerbTool { verb: Verb::Delete },
    )?;

    Ok(registry)
}

/// Definition skeleton shared by every verb tool: `path` first, then the optional extras.
fn verb_tool(name: &str, verb: Verb, description: &str) -> VerbToolDefinition {
    VerbToolDefinition {
        definition: ToolDefinition::new(name, description)
            .annotations(annotations_for_verb(verb))
            .param(ParamSpec::required(
                "path",
                ParamType::String,
                "Resource path relative to the API base URL, e.g. /users/1",
            )),
    }
}

/// Keeps `headers`/`timeoutMs` last regardless of the verb-specific parameter.
struct VerbToolDefinition {
    definition: ToolDefinition,
}

impl VerbToolDefinition {
    fn param(self, spec: ParamSpec) -> ToolDefinition {
        self.definition
            .param(spec)
            .param(ParamSpec::optional(
                "headers",
                ParamType::Object,
                "Extra request headers (string values)",
            ))
            .param(ParamSpec::optional(
                "timeoutMs",
                ParamType::Integer,
                "Per-call timeout in milliseconds (overrides the configured default)",
            ))
    }
}

fn query_param() -> ParamSpec {
    ParamSpec::optional(
        "query",
        ParamType::Object,
        "Query parameters; array values are sent as repeated keys",
    )
}

fn body_param() -> ParamSpec {
    ParamSpec::required("body", ParamType::Object, "JSON request body")
}

struct VerbTool {
    verb: Verb,
}

#[async_trait]
impl ToolHandler for VerbTool {
    async fn call(&self, gateway: &RestGateway, args: ValidatedArgs) -> Result<Value, ToolError> {
        let path = args.str("path").unwrap_or_default().trim();
        if path.is_empty() {
            return Err(ToolError::invalid_argument("path", "must not be empty"));
        }

        let timeout = match args.i64("timeoutMs") {
            None => None,
            Some(ms) => match u64::try_from(ms) {
                Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
                _ => return Err(ToolError::invalid_argument("timeoutMs", "must be positive")),
            },
        };

        let headers = header_pairs(args.object("headers"))?;

        let req = RestRequest::new(self.verb, path)
            .with_query(args.object("query").cloned())
            .with_body(args.get("body").cloned())
            .with_headers(headers)
            .with_timeout(timeout);

        Ok(gateway.execute(&req).await?)
    }
}

fn header_pairs(headers: Option<&Map<String, Value>>) -> Result<Vec<(String, String)>, ToolError> {
    let Some(headers) = headers else {
        return Ok(Vec::new());
    };
    headers
        .iter()
        .map(|(k, v)| match v.as_str() {
            Some(s) => Ok((k.clone(), s.to_string())),
            None => Err(ToolError::invalid_argument(
                "headers",
                format!("value for '{k}' must be a string"),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::builtin_registry;
    use crate::error::ToolError;
    use crate::validate::validate_arguments;
    use serde_json::{Value, json};
    use unrelated_rest_tools::config::RestBackendConfig;
    use unrelated_rest_tools::gateway::RestGateway;

    #[test]
    fn catalog_lists_verb_tools_in_order() {
        let registry = builtin_registry().expect("catalog");
        let tools = registry.list();
        let names: Vec<&str> = tools.iter().map(|t| &*t.name).collect();
        assert_eq!(names, vec!["fetch", "create", "replace", "remove"]);

        let fetch = &tools[0];
        let annotations = fetch.annotations.as_ref().expect("annotations");
        assert_eq!(annotations.read_only_hint, Some(true));

        let create_schema = Value::Object(tools[1].input_schema.as_ref().clone());
        assert_eq!(create_schema["required"], json!(["path", "body"]));
        let props = create_schema["properties"].as_object().expect("properties");
        let order: Vec<&str> = registry
            .lookup("create")
            .expect("create")
            .definition
            .params
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(order, vec!["path", "body", "headers", "timeoutMs"]);
        assert!(props.contains_key("timeoutMs"));
    }

    async fn call(tool: &str, args: Value) -> Result<Value, ToolError> {
        // Nothing listens on port 1; these calls must fail before reaching the network.
        let gateway =
            RestGateway::new(RestBackendConfig::new("http://127.0.0.1:1")).expect("gateway");
        let registry = builtin_registry().expect("catalog");
        let entry = registry.lookup(tool).expect("tool");
        let args = validate_arguments(&entry.definition, args.as_object().cloned().expect("obj"))?;
        entry.handler.call(&gateway, args).await
    }

    #[tokio::test]
    async fn blank_path_is_rejected_by_handler() {
        let err = call("fetch", json!({"path": "   "})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { ref name, .. } if name == "path"));
    }

    #[tokio::test]
    async fn non_positive_timeout_is_rejected() {
        let err = call("fetch", json!({"path": "/users", "timeoutMs": 0}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timeoutMs"));
    }

    #[tokio::test]
    async fn non_string_header_value_is_rejected() {
        let err = call(
            "remove",
            json!({"path": "/users/1", "headers": {"x-trace": 7}}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("x-trace"));
    }
}
