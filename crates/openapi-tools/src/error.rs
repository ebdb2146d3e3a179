//! Error types for `hub-mcp-openapi-tools`.

use thiserror::Error;

/// Main error type for the `OpenAPI` tool engine.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (invalid config, missing fields, conflicts).
    #[error("Configuration error: {0}")]
    Config(String),

    /// `OpenAPI` document errors (unexpected shape, unusable operation).
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    /// The invocation referenced a tool name that is not in the catalog.
    #[error("Tool {0} not found")]
    ToolNotFound(String),

    /// A required path parameter had no value in the invocation arguments.
    #[error("Missing required path parameter: {0}")]
    MissingRequiredParameter(String),

    #[error("Unsupported auth type: {0}")]
    UnsupportedAuthType(String),

    /// Credential exchange failed (login rejected, malformed login response).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The upstream answered with a non-2xx status.
    #[error("API call failed with status {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, timeout or body read failures.
    #[error("Request error: {0}")]
    Transport(String),

    /// JSON errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
