//! HTTP verb semantics.
//!
//! The gateway only speaks four verbs. Their RFC 9110 semantics decide two things: whether a
//! call may be served from (and stored in) the response cache, and which MCP `ToolAnnotations`
//! a tool backed by the verb advertises.

use reqwest::Method;
use rmcp::model::ToolAnnotations;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Safe (read-only) verbs are cacheable; everything else mutates the backend.
    #[must_use]
    pub fn is_read(self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate MCP tool annotations based on HTTP verb semantics.
///
/// `openWorldHint` is always `true`: every tool reaches an external system.
#[must_use]
pub fn annotations_for_verb(verb: Verb) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match verb {
        Verb::Get => (true, false, true),
        Verb::Post => (false, false, false),
        Verb::Put | Verb::Delete => (false, true, true),
    };

    ToolAnnotations {
        title: None,
        read_only_hint: Some(read_only),
        destructive_hint: Some(destructive),
        idempotent_hint: Some(idempotent),
        open_world_hint: Some(true),
    }
}
