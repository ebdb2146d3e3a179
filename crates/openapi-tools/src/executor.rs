//! Turns a tool invocation into an HTTP call and normalizes the response.

use crate::auth::AuthProvider;
use crate::document::ParamLocation;
use crate::error::{OpenApiToolsError, Result};
use crate::indexer::Route;
use crate::redact::{redact_url, sanitize_reqwest_error};
use base64::Engine as _;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use rmcp::model::{CallToolResult, Content};
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

/// Extra content item on successful calls made without credentials although auth is configured.
pub const UNAUTHENTICATED_NOTICE: &str = "The request was not authenticated.";

/// Path parameter whose value doubles as the PAT identity.
const IDENTITY_PARAM: &str = "namespace";

/// A request with everything but credentials resolved.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    /// Substituted path plus query string, as sent.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    /// Value of the `namespace` path argument, if one was supplied.
    pub identity: Option<String>,
}

/// Executes routes against one upstream host.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    resource_name: String,
    host: String,
    client: Client,
    auth: AuthProvider,
    base_headers: HeaderMap,
    timeout: Option<Duration>,
    evict_on_unauthorized: bool,
}

impl RequestExecutor {
    /// # Errors
    ///
    /// Returns an error if the user agent or one of the static headers is not a valid header.
    pub fn new(
        resource_name: impl Into<String>,
        host: impl Into<String>,
        client: Client,
        auth: AuthProvider,
        user_agent: &str,
        static_headers: &[(String, String)],
    ) -> Result<Self> {
        let mut base_headers = HeaderMap::new();
        base_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        base_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|_| {
                OpenApiToolsError::Config(format!("Invalid user agent: {user_agent}"))
            })?,
        );
        for (name, value) in static_headers {
            if !insert_header(&mut base_headers, name, value) {
                return Err(OpenApiToolsError::Config(format!(
                    "Invalid static header: {name}"
                )));
            }
        }

        Ok(Self {
            resource_name: resource_name.into(),
            host: host.into().trim_end_matches('/').to_string(),
            client,
            auth,
            base_headers,
            timeout: None,
            evict_on_unauthorized: true,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_token_eviction(mut self, enabled: bool) -> Self {
        self.evict_on_unauthorized = enabled;
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn auth(&self) -> &AuthProvider {
        &self.auth
    }

    /// Resolve path, query, headers and body for `route` from `args`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::MissingRequiredParameter`] when a required path parameter has
    /// no value, or a transport error for header values that cannot be sent.
    pub fn prepare(&self, route: &Route, args: &Value) -> Result<PreparedRequest> {
        let mut path = route.path.clone();
        let mut identity = None;

        for param in route.parameters_in(ParamLocation::Path) {
            match supplied(args, &param.name) {
                Some(value) => {
                    let raw = value_to_string(value);
                    if param.name == IDENTITY_PARAM {
                        identity = Some(raw.clone());
                    }
                    // First occurrence only; a repeated placeholder keeps its later copies.
                    path = path.replacen(
                        &format!("{{{}}}", param.name),
                        &encode_path_component(&raw),
                        1,
                    );
                }
                None if param.required => {
                    return Err(OpenApiToolsError::MissingRequiredParameter(
                        param.name.clone(),
                    ));
                }
                None => {}
            }
        }

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        let mut has_query = false;
        for param in route.parameters_in(ParamLocation::Query) {
            if let Some(value) = supplied(args, &param.name)
                && !is_query_sentinel(value)
            {
                query.append_pair(&param.name, &value_to_string(value));
                has_query = true;
            }
        }
        if has_query {
            path.push('?');
            path.push_str(&query.finish());
        }

        let mut headers = self.base_headers.clone();
        for param in route.parameters_in(ParamLocation::Header) {
            if let Some(value) = supplied(args, &param.name)
                && !insert_header(&mut headers, &param.name, &value_to_string(value))
            {
                return Err(OpenApiToolsError::Transport(format!(
                    "Invalid header: {}",
                    param.name
                )));
            }
        }

        let body = if matches!(route.method, Method::POST | Method::PUT | Method::PATCH) {
            supplied(args, "body").cloned()
        } else {
            None
        };

        Ok(PreparedRequest {
            method: route.method.clone(),
            path_and_query: path,
            headers,
            body,
            identity,
        })
    }

    /// Run the call and fold every failure into an error result.
    pub async fn execute(&self, route: &Route, args: &Value) -> CallToolResult {
        match self.try_execute(route, args).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    backend = %self.resource_name,
                    tool = %route.tool_name,
                    error = %e,
                    "Tool call failed"
                );
                error_result(&e)
            }
        }
    }

    /// Run the call.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Http`] for non-2xx responses and other variants for failures
    /// before or during dispatch.
    pub async fn try_execute(&self, route: &Route, args: &Value) -> Result<CallToolResult> {
        let prepared = self.prepare(route, args)?;
        let url = Url::parse(&format!("{}{}", self.host, prepared.path_and_query))
            .map_err(|e| OpenApiToolsError::Config(format!("Invalid URL: {e}")))?;

        let token = self.auth.authenticate(prepared.identity.as_deref()).await?;
        let authenticated = !token.is_empty();

        tracing::info!(
            backend = %self.resource_name,
            method = %prepared.method,
            url = %redact_url(&url),
            authenticated,
            "Making request"
        );

        let mut request = self
            .client
            .request(prepared.method.clone(), url)
            .headers(prepared.headers);
        if authenticated {
            request = request.bearer_auth(&token);
        }
        if let Some(body) = &prepared.body {
            request = request.body(serde_json::to_vec(body)?);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OpenApiToolsError::Transport(sanitize_reqwest_error(&e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| OpenApiToolsError::Transport(sanitize_reqwest_error(&e)))?;
        let payload = parse_payload(&bytes, content_type.as_deref());

        if !status.is_success() {
            tracing::warn!(
                backend = %self.resource_name,
                tool = %route.tool_name,
                status = status.as_u16(),
                "Upstream returned an error status"
            );
            if status == StatusCode::UNAUTHORIZED
                && authenticated
                && self.evict_on_unauthorized
                && self.auth.invalidate(prepared.identity.as_deref())
            {
                tracing::info!(
                    backend = %self.resource_name,
                    "Evicted cached token after 401"
                );
            }
            return Err(OpenApiToolsError::Http {
                status: status.as_u16(),
                body: pretty(&payload),
            });
        }

        let mut content = vec![Content::text(format!(
            "{} {} ({})\n\n{}",
            prepared.method,
            prepared.path_and_query,
            status.as_u16(),
            pretty(&payload)
        ))];
        if self.auth.is_configured() && !authenticated {
            content.push(Content::text(UNAUTHENTICATED_NOTICE));
        }

        let mut result = CallToolResult::success(content);
        if payload.is_object() {
            result.structured_content = Some(payload);
        }
        Ok(result)
    }
}

/// Error result for a failed invocation. Upstream error statuses keep their own message; other
/// failures are prefixed.
#[must_use]
pub fn error_result(e: &OpenApiToolsError) -> CallToolResult {
    let text = match e {
        OpenApiToolsError::Http { .. } => e.to_string(),
        other => format!("Error executing API call: {other}"),
    };
    CallToolResult::error(vec![Content::text(text)])
}

/// Argument value, treating JSON `null` as absent.
fn supplied<'a>(args: &'a Value, name: &str) -> Option<&'a Value> {
    args.get(name).filter(|v| !v.is_null())
}

fn is_query_sentinel(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == "null",
        _ => false,
    }
}

/// Set (not append) a header. Returns `false` if the name or value cannot be sent.
fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> bool {
    let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) else {
        return false;
    };
    headers.insert(name, value);
    true
}

/// Convert a JSON value to a string for URL/header parameters.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Percent-encode one path segment, keeping `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
#[must_use]
pub fn encode_path_component(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if b.is_ascii_alphanumeric()
            || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
        {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

/// Body as JSON when it parses, else as text. Non-UTF-8 bodies are wrapped as base64.
fn parse_payload(bytes: &[u8], content_type: Option<&str>) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(text) => serde_json::from_str(text).unwrap_or_else(|_| json!(text)),
        Err(_) => json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        }),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Operation;

    fn executor() -> RequestExecutor {
        RequestExecutor::new(
            "repos",
            "https://hub.example.com/v2/",
            Client::new(),
            AuthProvider::new(None, "http://127.0.0.1:1/login", Client::new()),
            "test-agent/1.0",
            &[("X-Static".to_string(), "yes".to_string())],
        )
        .unwrap()
    }

    fn route(method: Method, path: &str, op: Value) -> Route {
        Route {
            tool_name: "t".to_string(),
            path: path.to_string(),
            method,
            operation: Operation::from_value(&op).unwrap(),
        }
    }

    fn repo_route() -> Route {
        route(
            Method::GET,
            "/namespaces/{namespace}/repositories/{repo}",
            json!({
                "parameters": [
                    {"name": "namespace", "in": "path", "required": true},
                    {"name": "repo", "in": "path", "required": true},
                    {"name": "page", "in": "query"},
                    {"name": "ordering", "in": "query"},
                    {"name": "active", "in": "query"},
                    {"name": "X-Request-Id", "in": "header"}
                ]
            }),
        )
    }

    #[test]
    fn substitutes_and_encodes_path_parameters() {
        let prepared = executor()
            .prepare(
                &repo_route(),
                &json!({"namespace": "my org", "repo": "a/b"}),
            )
            .unwrap();

        assert_eq!(
            prepared.path_and_query,
            "/namespaces/my%20org/repositories/a%2Fb"
        );
        assert_eq!(prepared.identity.as_deref(), Some("my org"));
        assert!(prepared.body.is_none());
    }

    #[test]
    fn missing_required_path_parameter_is_an_error() {
        let err = executor()
            .prepare(&repo_route(), &json!({"namespace": "library"}))
            .unwrap_err();
        assert!(matches!(err, OpenApiToolsError::MissingRequiredParameter(ref n) if n == "repo"));
        assert_eq!(err.to_string(), "Missing required path parameter: repo");
    }

    #[test]
    fn query_skips_sentinels_but_keeps_falsy_values() {
        let ex = executor();
        let r = repo_route();

        let all_sentinels = ex
            .prepare(
                &r,
                &json!({"namespace": "l", "repo": "r", "page": null, "ordering": "", "active": "null"}),
            )
            .unwrap();
        assert_eq!(all_sentinels.path_and_query, "/namespaces/l/repositories/r");

        let falsy = ex
            .prepare(
                &r,
                &json!({"namespace": "l", "repo": "r", "page": "0", "active": false, "ordering": "last updated"}),
            )
            .unwrap();
        assert_eq!(
            falsy.path_and_query,
            "/namespaces/l/repositories/r?page=0&ordering=last+updated&active=false"
        );
    }

    #[test]
    fn array_values_are_comma_joined() {
        let ex = executor();
        let prepared = ex
            .prepare(
                &repo_route(),
                &json!({
                    "namespace": ["my", "org"],
                    "repo": "r",
                    "ordering": ["a", "b"],
                    "page": [1, [2, 3], null],
                    "X-Request-Id": [true, "x"]
                }),
            )
            .unwrap();

        assert_eq!(
            prepared.path_and_query,
            "/namespaces/my%2Corg/repositories/r?page=1%2C2%2C3%2C&ordering=a%2Cb"
        );
        assert_eq!(prepared.identity.as_deref(), Some("my,org"));
        assert_eq!(prepared.headers["x-request-id"], "true,x");
        assert_eq!(value_to_string(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn repeated_placeholder_is_substituted_once() {
        let r = route(
            Method::GET,
            "/mirror/{name}/of/{name}",
            json!({"parameters": [{"name": "name", "in": "path", "required": true}]}),
        );
        let prepared = executor().prepare(&r, &json!({"name": "nginx"})).unwrap();
        assert_eq!(prepared.path_and_query, "/mirror/nginx/of/{name}");
    }

    #[test]
    fn header_parameters_override_static_headers() {
        let prepared = executor()
            .prepare(
                &repo_route(),
                &json!({"namespace": "l", "repo": "r", "X-Request-Id": 42}),
            )
            .unwrap();

        assert_eq!(prepared.headers["x-request-id"], "42");
        assert_eq!(prepared.headers["x-static"], "yes");
        assert_eq!(prepared.headers[CONTENT_TYPE], "application/json");
        assert_eq!(prepared.headers[USER_AGENT], "test-agent/1.0");
    }

    #[test]
    fn body_only_for_write_methods() {
        let ex = executor();
        let args = json!({"body": {"name": "nginx", "tags": [1, 2]}});
        for m in [Method::POST, Method::PUT, Method::PATCH] {
            let p = ex.prepare(&route(m, "/repos", json!({})), &args).unwrap();
            assert_eq!(p.body, Some(json!({"name": "nginx", "tags": [1, 2]})));
        }
        for m in [Method::GET, Method::HEAD, Method::DELETE, Method::OPTIONS] {
            let p = ex.prepare(&route(m, "/repos", json!({})), &args).unwrap();
            assert!(p.body.is_none());
        }
    }

    #[test]
    fn path_component_encoding_matches_uri_component_rules() {
        assert_eq!(encode_path_component("a-b_c.d!e~f*g'h(i)"), "a-b_c.d!e~f*g'h(i)");
        assert_eq!(encode_path_component("a b/c?d&é"), "a%20b%2Fc%3Fd%26%C3%A9");
    }

    #[test]
    fn payload_parsing_falls_back_to_text_and_base64() {
        assert_eq!(parse_payload(br#"{"a":1}"#, None), json!({"a": 1}));
        assert_eq!(parse_payload(b"plain", None), json!("plain"));
        let binary = parse_payload(&[0xff, 0xfe], Some("application/octet-stream"));
        assert_eq!(binary["encoding"], "base64");
        assert_eq!(binary["mimeType"], "application/octet-stream");
        assert_eq!(binary["data"], "//4=");
    }

    #[test]
    fn error_results_keep_http_message_and_prefix_others() {
        let http = error_result(&OpenApiToolsError::Http {
            status: 404,
            body: "\"gone\"".to_string(),
        });
        let v = serde_json::to_value(&http).unwrap();
        assert_eq!(v["isError"], true);
        assert_eq!(
            v["content"][0]["text"],
            "API call failed with status 404: \"gone\""
        );

        let missing = error_result(&OpenApiToolsError::MissingRequiredParameter("repo".into()));
        let v = serde_json::to_value(&missing).unwrap();
        assert_eq!(
            v["content"][0]["text"],
            "Error executing API call: Missing required path parameter: repo"
        );
    }
}
