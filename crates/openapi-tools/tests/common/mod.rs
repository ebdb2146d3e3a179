#![allow(dead_code)]

use anyhow::Context as _;
use hub_mcp_openapi_tools::{ApiDocument, AuthConfig, OpenApiResource, ResourceConfig};
use hub_mcp_test_support::MockUpstream;
use rmcp::model::CallToolResult;
use serde_json::Value;

pub const HUB_DOCUMENT: &str = include_str!("../fixtures/hub.yaml");

pub fn hub_document() -> anyhow::Result<ApiDocument> {
    ApiDocument::from_yaml_str(HUB_DOCUMENT).context("parse hub fixture")
}

/// Resource pointed at the mock, with PAT login going to the mock as well.
pub fn resource(upstream: &MockUpstream, auth: Option<AuthConfig>) -> anyhow::Result<OpenApiResource> {
    let mut config = ResourceConfig::new("repos", upstream.base_url());
    config.login_url = upstream.url("/v2/users/login");
    config.auth = auth;
    OpenApiResource::new(&config, &hub_document()?).context("build resource")
}

pub fn pat(username: &str, secret: &str) -> AuthConfig {
    AuthConfig::Pat {
        username: Some(username.to_string()),
        token: Some(secret.to_string()),
    }
}

pub fn as_json(result: &CallToolResult) -> Value {
    serde_json::to_value(result).expect("serialize CallToolResult")
}

pub fn is_error(result: &CallToolResult) -> bool {
    as_json(result)["isError"] == Value::Bool(true)
}

pub fn text(result: &CallToolResult, idx: usize) -> String {
    as_json(result)["content"][idx]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

pub fn content_len(result: &CallToolResult) -> usize {
    as_json(result)["content"]
        .as_array()
        .map_or(0, Vec::len)
}
