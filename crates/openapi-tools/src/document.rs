//! In-memory `OpenAPI` document model.
//!
//! The engine receives an already dereferenced document. Path items are kept as an
//! order-preserving JSON tree so method keys can be matched case-insensitively; each operation is
//! validated into a typed [`Operation`] when the route table is built.

use crate::error::{OpenApiToolsError, Result};
use openapiv3::{Info, Server};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A dereferenced `OpenAPI` v3 document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiDocument {
    #[serde(default)]
    pub openapi: Option<String>,
    #[serde(default)]
    pub info: Option<Info>,
    #[serde(default)]
    pub servers: Vec<Server>,
    /// `path -> path item`, in document order.
    #[serde(default)]
    pub paths: Map<String, Value>,
}

impl ApiDocument {
    /// Parse a YAML or JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML/JSON or `paths` is not an object.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Build a document from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not have the shape of an `OpenAPI` document.
    pub fn from_json_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// First server URL declared by the document, if any.
    #[must_use]
    pub fn first_server_url(&self) -> Option<&str> {
        self.servers.first().map(|s| s.url.as_str())
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.title.as_str())
    }
}

/// Where a parameter is carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamLocation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parameter definition (`in: path|query|header|cookie`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParameterDef {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ParameterDef {
    /// Parse one parameter object.
    ///
    /// # Errors
    ///
    /// Returns an error for unresolved `$ref`s and objects without `name`/`in`.
    pub fn from_value(value: &Value) -> Result<Self> {
        if let Some(reference) = value.get("$ref").and_then(Value::as_str) {
            return Err(OpenApiToolsError::OpenApi(format!(
                "unresolved parameter reference '{reference}'"
            )));
        }
        Ok(Self::deserialize(value)?)
    }

    /// The declared JSON type, if the schema carries one.
    #[must_use]
    pub fn schema_type(&self) -> Option<&str> {
        self.schema
            .as_ref()
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
    }
}

/// Request body definition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RequestBodyDef {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: Map<String, Value>,
}

impl RequestBodyDef {
    /// Schema of the `application/json` media type, if declared.
    #[must_use]
    pub fn json_schema(&self) -> Option<&Value> {
        self.content
            .get("application/json")
            .and_then(|mt| mt.get("schema"))
            .filter(|s| !s.is_null())
    }
}

/// Typed view of an `OpenAPI` operation object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<ParameterDef>,
    pub request_body: Option<RequestBodyDef>,
    pub deprecated: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOperation {
    #[serde(default)]
    operation_id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Vec<Value>,
    #[serde(default)]
    request_body: Option<Value>,
    #[serde(default)]
    deprecated: bool,
}

impl Operation {
    /// Validate an operation object.
    ///
    /// Parameters that cannot be parsed are dropped with a warning; a malformed operation
    /// object or request body is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an operation object.
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(OpenApiToolsError::OpenApi(
                "operation is not an object".to_string(),
            ));
        }
        let raw = RawOperation::deserialize(value)?;

        let mut parameters = Vec::with_capacity(raw.parameters.len());
        for p in &raw.parameters {
            match ParameterDef::from_value(p) {
                Ok(def) => parameters.push(def),
                Err(e) => tracing::warn!(
                    operation_id = raw.operation_id.as_deref().unwrap_or_default(),
                    error = %e,
                    "dropping unusable parameter"
                ),
            }
        }

        let request_body = match raw.request_body {
            Some(Value::Null) | None => None,
            Some(body) => {
                if let Some(reference) = body.get("$ref").and_then(Value::as_str) {
                    return Err(OpenApiToolsError::OpenApi(format!(
                        "unresolved requestBody reference '{reference}'"
                    )));
                }
                Some(RequestBodyDef::deserialize(body)?)
            }
        };

        Ok(Self {
            operation_id: raw.operation_id,
            summary: raw.summary.filter(|s| !s.is_empty()),
            description: raw.description.filter(|s| !s.is_empty()),
            parameters,
            request_body,
            deprecated: raw.deprecated,
        })
    }

    /// Parameters declared at a given location, in declaration order.
    pub fn parameters_in(&self, location: ParamLocation) -> impl Iterator<Item = &ParameterDef> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }
}
