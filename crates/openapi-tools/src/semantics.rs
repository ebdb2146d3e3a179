//! MCP tool annotations derived from HTTP method semantics.

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// `(read_only, destructive, idempotent)` hints per method; `None` means "do not guess".
fn method_hints(method: &Method) -> (Option<bool>, Option<bool>, Option<bool>) {
    match method.as_str() {
        "GET" | "HEAD" | "OPTIONS" => (Some(true), Some(false), Some(true)),
        "POST" => (Some(false), Some(false), Some(false)),
        "PUT" | "DELETE" => (Some(false), Some(true), Some(true)),
        "PATCH" => (Some(false), Some(true), None),
        _ => (None, None, None),
    }
}

/// Annotations for a tool backed by `method`. `openWorldHint` is always set: every tool talks
/// to a remote API.
#[must_use]
pub fn annotations_for_method(method: &Method) -> ToolAnnotations {
    let (read_only_hint, destructive_hint, idempotent_hint) = method_hints(method);
    ToolAnnotations {
        title: None,
        read_only_hint,
        destructive_hint,
        idempotent_hint,
        open_world_hint: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_read_only_and_idempotent() {
        for m in [Method::GET, Method::HEAD, Method::OPTIONS] {
            let a = annotations_for_method(&m);
            assert_eq!(a.read_only_hint, Some(true));
            assert_eq!(a.idempotent_hint, Some(true));
            assert_eq!(a.open_world_hint, Some(true));
        }
    }

    #[test]
    fn writes_differ_in_idempotence() {
        assert_eq!(annotations_for_method(&Method::POST).idempotent_hint, Some(false));
        assert_eq!(annotations_for_method(&Method::PUT).idempotent_hint, Some(true));
        assert_eq!(annotations_for_method(&Method::PATCH).idempotent_hint, None);
        assert_eq!(
            annotations_for_method(&Method::DELETE).destructive_hint,
            Some(true)
        );
    }
}
