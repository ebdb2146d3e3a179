use crate::error::{OpenApiToolsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_LOGIN_URL: &str = "https://hub.docker.com/v2/users/login";
pub const DEFAULT_USER_AGENT: &str = "OpenAPI-MCP-Server/1.0.0";

/// Configuration for one OpenAPI-backed tool resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// Resource name (used in synthesized tool descriptions and logs).
    pub name: String,

    /// Base URL every route path is appended to. Falls back to the document's first server.
    #[serde(default)]
    pub host: Option<String>,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Endpoint used to exchange a PAT for a bearer token.
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Client identifier sent as `User-Agent`.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Static headers applied to every call (before header parameters).
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-request timeout in seconds. `None` leaves the transport default in place.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// What to do when two operations map to the same tool name.
    #[serde(default)]
    pub duplicate_tool_names: DuplicateToolPolicy,

    /// Drop a cached PAT token when the upstream answers 401, so the next call logs in again.
    #[serde(default = "default_true")]
    pub evict_token_on_unauthorized: bool,
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_true() -> bool {
    true
}

impl ResourceConfig {
    /// Minimal config with defaults for everything but name and host.
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: Some(host.into()),
            auth: None,
            login_url: default_login_url(),
            user_agent: default_user_agent(),
            headers: HashMap::new(),
            timeout_secs: None,
            duplicate_tool_names: DuplicateToolPolicy::default(),
            evict_token_on_unauthorized: true,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Parse a config from YAML (JSON is accepted too, being a YAML subset).
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML, does not match the config shape, or names
    /// an unsupported auth type.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        if let Some(kind) = value
            .get("auth")
            .and_then(|a| a.get("type"))
            .and_then(serde_yaml::Value::as_str)
        {
            AuthKind::parse(kind)?;
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}

/// Tool-name collision policy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateToolPolicy {
    /// Later operation replaces the earlier one (logged as a warning).
    #[default]
    Overwrite,
    /// Indexing fails on the first duplicate.
    Reject,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    /// Static bearer token.
    Bearer {
        #[serde(default)]
        token: Option<String>,
    },
    /// Personal access token exchanged for a bearer token via the login endpoint.
    Pat {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        token: Option<String>,
    },
}

impl AuthConfig {
    /// Build an auth config from a loosely typed `type` string.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::UnsupportedAuthType`] for anything but `bearer` and `pat`.
    pub fn from_parts(
        kind: &str,
        username: Option<String>,
        token: Option<String>,
    ) -> Result<Self> {
        Ok(match AuthKind::parse(kind)? {
            AuthKind::Bearer => AuthConfig::Bearer { token },
            AuthKind::Pat => AuthConfig::Pat { username, token },
        })
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::Pat { .. } => "pat",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AuthKind {
    Bearer,
    Pat,
}

impl AuthKind {
    fn parse(kind: &str) -> Result<Self> {
        match kind {
            "bearer" => Ok(AuthKind::Bearer),
            "pat" => Ok(AuthKind::Pat),
            other => Err(OpenApiToolsError::UnsupportedAuthType(other.to_string())),
        }
    }
}
