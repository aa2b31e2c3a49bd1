//! Tool annotations derived from HTTP method semantics (RFC 9110).

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// Hints for a tool that issues `method` upstream.
///
/// Every tool talks to an external system, so `open_world_hint` is always set. Methods outside
/// RFC 9110 get no other hints.
#[must_use]
pub fn annotations_for_method(method: &Method) -> ToolAnnotations {
    // (read_only, destructive, idempotent)
    let hints = match method.as_str() {
        "GET" | "HEAD" | "OPTIONS" | "TRACE" => (Some(true), Some(false), Some(true)),
        "POST" => (Some(false), Some(false), Some(false)),
        "PUT" | "DELETE" => (Some(false), Some(true), Some(true)),
        // PATCH may or may not be idempotent.
        "PATCH" => (Some(false), Some(true), None),
        _ => (None, None, None),
    };

    ToolAnnotations {
        title: None,
        read_only_hint: hints.0,
        destructive_hint: hints.1,
        idempotent_hint: hints.2,
        open_world_hint: Some(true),
    }
}
