//! Tool registry: static mapping from tool name to definition + handler.
//!
//! The registry is filled once at startup and only read afterwards, so lookups need no locking.
//! Listing order is registration order.

use crate::error::{RegistryError, ToolError};
use crate::validate::ValidatedArgs;
use async_trait::async_trait;
use rmcp::model::{JsonObject, Tool, ToolAnnotations};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use unrelated_rest_tools::gateway::RestGateway;

/// Declared type of a tool parameter (JSON Schema `type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Static description of a tool, returned verbatim by `tools/list`.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// Parameters in declaration order.
    pub params: Vec<ParamSpec>,
    pub annotations: Option<ToolAnnotations>,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params: Vec::new(),
            annotations: None,
        }
    }

    #[must_use]
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    #[must_use]
    pub fn annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    #[must_use]
    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON Schema (`type: object`) describing the tool's arguments.
    #[must_use]
    pub fn input_schema(&self) -> JsonObject {
        let mut properties = JsonObject::new();
        let mut required: Vec<&str> = Vec::new();

        for p in &self.params {
            properties.insert(
                p.name.clone(),
                json!({
                    "type": p.param_type.as_str(),
                    "description": p.description,
                }),
            );
            if p.required {
                required.push(&p.name);
            }
        }

        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), json!(required));
        }
        schema
    }

    #[must_use]
    pub fn to_tool(&self) -> Tool {
        let mut tool = Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(self.input_schema()),
        );
        tool.annotations.clone_from(&self.annotations);
        tool
    }
}

/// Uniform handler interface: validated arguments in, decoded REST result out.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, gateway: &RestGateway, args: ValidatedArgs) -> Result<Value, ToolError>;
}

pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub handler: Arc<dyn ToolHandler>,
    tool: Tool,
}

impl RegisteredTool {
    /// The MCP view of this tool.
    #[must_use]
    pub fn tool(&self) -> &Tool {
        &self.tool
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool name is already registered or the definition declares the
    /// same parameter twice.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: impl ToolHandler + 'static,
    ) -> Result<(), RegistryError> {
        if self.index.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateTool(definition.name));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for p in &definition.params {
            if !seen.insert(&p.name) {
                return Err(RegistryError::DuplicateParam {
                    tool: definition.name.clone(),
                    param: p.name.clone(),
                });
            }
        }

        let tool = definition.to_tool();
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            definition,
            handler: Arc::new(handler),
            tool,
        });
        Ok(())
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// All tools, in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.tool.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ParamSpec, ParamType, ToolDefinition, ToolHandler, ToolRegistry};
    use crate::error::{RegistryError, ToolError};
    use crate::validate::ValidatedArgs;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use unrelated_rest_tools::gateway::RestGateway;

    struct Noop;

    #[async_trait]
    impl ToolHandler for Noop {
        async fn call(
            &self,
            _gateway: &RestGateway,
            _args: ValidatedArgs,
        ) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    fn def(name: &str) -> ToolDefinition {
        ToolDefinition::new(name, "test tool")
            .param(ParamSpec::required("path", ParamType::String, "Resource path"))
            .param(ParamSpec::optional("query", ParamType::Object, "Query parameters"))
    }

    #[test]
    fn list_preserves_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(def(name), Noop).expect("register");
        }
        let names: Vec<String> = registry.list().iter().map(|t| t.name.to_string()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn lookup_finds_registered_tools_only() {
        let mut registry = ToolRegistry::new();
        registry.register(def("fetch"), Noop).expect("register");
        assert!(registry.lookup("fetch").is_some());
        assert!(registry.lookup("Fetch").is_none());
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn duplicate_tool_and_param_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(def("fetch"), Noop).expect("register");
        assert!(matches!(
            registry.register(def("fetch"), Noop),
            Err(RegistryError::DuplicateTool(_))
        ));

        let dup = def("other").param(ParamSpec::optional("path", ParamType::String, "again"));
        assert!(matches!(
            registry.register(dup, Noop),
            Err(RegistryError::DuplicateParam { .. })
        ));
    }

    #[test]
    fn input_schema_lists_properties_and_required() {
        let schema = serde_json::Value::Object(def("fetch").input_schema());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert_eq!(schema["properties"]["query"]["type"], "object");
        assert_eq!(schema["required"], json!(["path"]));
    }

    #[test]
    fn param_type_matching() {
        assert!(ParamType::Integer.matches(&json!(3)));
        assert!(!ParamType::Integer.matches(&json!(3.5)));
        assert!(ParamType::Number.matches(&json!(3.5)));
        assert!(ParamType::Object.matches(&json!({})));
        assert!(!ParamType::Object.matches(&json!([])));
        assert!(!ParamType::String.matches(&json!(null)));
    }
}
