//! Error types for the REST bridge.

use thiserror::Error;
use unrelated_rest_tools::error::RestError;

/// Why a tool call failed.
///
/// Every variant is converted into an `isError: true` tool result by the dispatcher; none of
/// them ends the protocol session.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Tool name not in the registry.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments do not match the tool's parameter schema.
    #[error("Invalid arguments: {0}")]
    Validation(String),

    /// Arguments are well-typed but semantically unusable (e.g. an empty path).
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// The REST call failed (transport, backend status, decode).
    #[error(transparent)]
    Rest(#[from] RestError),
}

impl ToolError {
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly category, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::Validation(_) | Self::InvalidArgument { .. } => "validation",
            Self::Rest(RestError::Transport(_)) => "transport",
            Self::Rest(RestError::Backend { .. }) => "backend",
            Self::Rest(RestError::Decode(_)) => "decode",
            Self::Rest(RestError::Blocked(_)) => "blocked",
            Self::Rest(RestError::Config(_) | RestError::InvalidRequest(_)) => "request",
        }
    }
}

/// Registry construction errors (startup only).
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Duplicate tool name '{0}'")]
    DuplicateTool(String),

    #[error("Duplicate parameter '{param}' in tool '{tool}'")]
    DuplicateParam { tool: String, param: String },
}

#[cfg(test)]
mod tests {
    use super::ToolError;
    use unrelated_rest_tools::error::RestError;

    #[test]
    fn unknown_tool_message_names_the_tool() {
        assert_eq!(
            ToolError::UnknownTool("frobnicate".into()).to_string(),
            "Unknown tool: frobnicate"
        );
    }

    #[test]
    fn rest_errors_display_transparently() {
        let err = ToolError::from(RestError::Transport("connection refused".into()));
        assert_eq!(err.to_string(), "Transport error: connection refused");
        assert_eq!(err.kind(), "transport");
    }
}
