//! Argument validation against a tool's declared parameters.
//!
//! Validation is purely local: it never touches the network. Handlers only ever see
//! [`ValidatedArgs`], which can only be produced here.

use crate::error::ToolError;
use crate::registry::ToolDefinition;
use serde_json::{Map, Value};

/// Tool arguments that passed schema validation.
///
/// Every required parameter is present with its declared type; optional parameters are either
/// absent or well-typed (explicit `null` is treated as absent).
#[derive(Debug, Clone, Default)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name).and_then(Value::as_object)
    }

    #[must_use]
    pub fn u64(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(Value::as_u64)
    }

    #[must_use]
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Check `args` against `definition`.
///
/// # Errors
///
/// Returns `ToolError::Validation` naming every unknown, missing or mistyped parameter.
pub fn validate_arguments(
    definition: &ToolDefinition,
    args: Map<String, Value>,
) -> Result<ValidatedArgs, ToolError> {
    let mut violations: Vec<String> = Vec::new();

    // Unknown parameters (with suggestions).
    let known: Vec<&str> = definition.params.iter().map(|p| p.name.as_str()).collect();
    for key in args.keys() {
        if known.contains(&key.as_str()) {
            continue;
        }
        match find_similar_strings(key, &known).first() {
            Some(s) => violations.push(format!("unknown parameter '{key}' (did you mean '{s}'?)")),
            None => violations.push(format!("unknown parameter '{key}'")),
        }
    }

    // Missing required parameters / type mismatches.
    for spec in &definition.params {
        match args.get(&spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    violations.push(format!("missing required parameter '{}'", spec.name));
                }
            }
            Some(v) if !spec.param_type.matches(v) => violations.push(format!(
                "parameter '{}' must be of type {}, got {}",
                spec.name,
                spec.param_type,
                json_type_name(v)
            )),
            Some(_) => {}
        }
    }

    if !violations.is_empty() {
        return Err(ToolError::Validation(violations.join("; ")));
    }

    let args = args
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .collect::<Map<String, Value>>();
    Ok(ValidatedArgs(args))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn find_similar_strings(unknown: &str, known: &[&str]) -> Vec<String> {
    let mut candidates: Vec<(f64, String)> = Vec::new();
    for k in known {
        let score = strsim::jaro(unknown, k);
        if score > 0.7 {
            candidates.push((score, (*k).to_string()));
        }
    }
    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    candidates.into_iter().map(|(_, s)| s).collect()
}
