//! Input schema synthesis for indexed routes.

use crate::document::{ParamLocation, ParameterDef};
use crate::indexer::Route;
use rmcp::model::JsonObject;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Fixed description of the synthetic `body` property.
pub const BODY_DESCRIPTION: &str = "Request body data";

/// JSON-Schema-like input contract for one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Properties in display order (path parameters first).
    pub properties: Map<String, Value>,
    /// Required argument names. May contain `"body"."<field>"` markers for body fields that
    /// carry their own `required: true` flag; no validator interprets those.
    pub required: Vec<String>,
}

impl InputSchema {
    #[must_use]
    pub fn to_json_object(&self) -> JsonObject {
        let mut obj = JsonObject::new();
        obj.insert("type".to_string(), json!(self.schema_type));
        obj.insert(
            "properties".to_string(),
            Value::Object(self.properties.clone()),
        );
        obj.insert("required".to_string(), json!(self.required));
        obj
    }

    #[must_use]
    pub fn property_names(&self) -> Vec<&str> {
        self.properties.keys().map(String::as_str).collect()
    }
}

/// What a tool looks like to the protocol layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

/// Derives tool definitions from routes.
#[derive(Debug, Clone)]
pub struct SchemaGenerator {
    resource_name: String,
}

impl SchemaGenerator {
    #[must_use]
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
        }
    }

    #[must_use]
    pub fn tool_definition(&self, route: &Route) -> ToolDefinition {
        ToolDefinition {
            name: route.tool_name.clone(),
            description: self.describe(route),
            input_schema: self.generate(route),
        }
    }

    /// Summary, then description, then `"METHOD path (resource)"`.
    #[must_use]
    pub fn describe(&self, route: &Route) -> String {
        let op = &route.operation;
        op.summary
            .clone()
            .or_else(|| op.description.clone())
            .unwrap_or_else(|| {
                format!(
                    "{} {} ({})",
                    route.method.as_str(),
                    route.path,
                    self.resource_name
                )
            })
    }

    #[must_use]
    pub fn generate(&self, route: &Route) -> InputSchema {
        let mut properties = Map::new();
        let mut required: Vec<String> = Vec::new();

        let mut params: Vec<&ParameterDef> = route
            .operation
            .parameters
            .iter()
            .filter(|p| {
                matches!(
                    p.location,
                    ParamLocation::Path | ParamLocation::Query | ParamLocation::Header
                )
            })
            .collect();
        // Stable: keeps declaration order within each group.
        params.sort_by_key(|p| p.location != ParamLocation::Path);

        for param in params {
            let description = param
                .description
                .clone()
                .unwrap_or_else(|| format!("{} parameter", param.location));
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.schema_type().unwrap_or("string"),
                    "description": description,
                }),
            );
            if param.required {
                push_unique(&mut required, param.name.clone());
            }
        }

        if let Some(body) = &route.operation.request_body
            && let Some(schema) = body.json_schema()
        {
            let mut body_prop = match schema {
                Value::Object(obj) => obj.clone(),
                _ => Map::new(),
            };
            body_prop.insert("description".to_string(), json!(BODY_DESCRIPTION));
            properties.insert("body".to_string(), Value::Object(body_prop));

            if body.required {
                push_unique(&mut required, "body".to_string());
            }
            if let Some(body_props) = schema.get("properties").and_then(Value::as_object) {
                for (field, field_schema) in body_props {
                    if field_schema.get("required").and_then(Value::as_bool) == Some(true) {
                        push_unique(&mut required, format!("\"body\".\"{field}\""));
                    }
                }
            }
        }

        InputSchema {
            schema_type: "object".to_string(),
            properties,
            required,
        }
    }
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}
