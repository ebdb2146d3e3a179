//! Route indexing: `OpenAPI` path tree -> tool-name keyed route table.

use crate::config::DuplicateToolPolicy;
use crate::document::{ApiDocument, Operation, ParamLocation, ParameterDef};
use crate::error::{OpenApiToolsError, Result};
use crate::registry::ParameterRegistry;
use regex::Regex;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// HTTP verbs that can become tools. Anything else under a path item is ignored.
pub const VALID_METHODS: [&str; 7] = ["get", "post", "put", "patch", "delete", "head", "options"];

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder regex"));
static NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("non-alnum regex"));

/// An indexed operation.
#[derive(Debug, Clone)]
pub struct Route {
    pub tool_name: String,
    /// Path template, e.g. `/namespaces/{namespace}/repositories/{repo}`.
    pub path: String,
    pub method: Method,
    /// Operation with path-level parameters merged in (path-level first).
    pub operation: Operation,
}

impl Route {
    /// Lowercase verb (`get`, `post`, ...).
    #[must_use]
    pub fn method_name(&self) -> String {
        self.method.as_str().to_ascii_lowercase()
    }

    pub fn parameters_in(&self, location: ParamLocation) -> impl Iterator<Item = &ParameterDef> {
        self.operation.parameters_in(location)
    }
}

/// Tool name -> route, in first-registration order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    /// Insert a route. A route with the same tool name is replaced in place and returned.
    pub fn insert(&mut self, route: Route) -> Option<Arc<Route>> {
        let route = Arc::new(route);
        if let Some(&i) = self.index.get(&route.tool_name) {
            return Some(std::mem::replace(&mut self.routes[i], route));
        }
        self.index.insert(route.tool_name.clone(), self.routes.len());
        self.routes.push(route);
        None
    }

    #[must_use]
    pub fn get(&self, tool_name: &str) -> Option<Arc<Route>> {
        self.index.get(tool_name).map(|&i| Arc::clone(&self.routes[i]))
    }

    #[must_use]
    pub fn contains(&self, tool_name: &str) -> bool {
        self.index.contains_key(tool_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Walks a document and builds the route table.
#[derive(Debug, Clone)]
pub struct RouteIndexer {
    resource_name: String,
    duplicates: DuplicateToolPolicy,
}

impl RouteIndexer {
    #[must_use]
    pub fn new(resource_name: impl Into<String>, duplicates: DuplicateToolPolicy) -> Self {
        Self {
            resource_name: resource_name.into(),
            duplicates,
        }
    }

    /// Index every usable operation of `doc`.
    ///
    /// Deprecated operations and keys that are not one of [`VALID_METHODS`] (compared
    /// case-insensitively) are skipped. Malformed operations are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error only under [`DuplicateToolPolicy::Reject`] when two operations share a
    /// tool name.
    pub fn index(&self, doc: &ApiDocument) -> Result<RouteTable> {
        let mut table = RouteTable::default();
        let mut registry = ParameterRegistry::new();

        for (path, path_item) in &doc.paths {
            let Some(path_item) = path_item.as_object() else {
                tracing::warn!(
                    backend = %self.resource_name,
                    path = %path,
                    "Skipping path: path item is not an object"
                );
                continue;
            };

            let shared = self.shared_parameters(path, path_item.get("parameters"), &mut registry);

            for (method_key, op_value) in path_item {
                if method_key == "parameters" {
                    continue;
                }
                let Some(method) = parse_http_method(method_key) else {
                    continue;
                };

                let mut operation = match Operation::from_value(op_value) {
                    Ok(op) => op,
                    Err(e) => {
                        tracing::warn!(
                            "Skipping {} {} in '{}': {}",
                            method_key.to_uppercase(),
                            path,
                            self.resource_name,
                            e
                        );
                        continue;
                    }
                };
                if operation.deprecated {
                    tracing::debug!(
                        backend = %self.resource_name,
                        method = %method,
                        path = %path,
                        "Skipping deprecated operation"
                    );
                    continue;
                }

                operation.parameters = merge_parameters(&shared, operation.parameters);
                self.attach_missing_path_parameters(path, &mut operation, &registry);

                let tool_name = operation
                    .operation_id
                    .clone()
                    .unwrap_or_else(|| generate_canonical_name(method_key, path));

                if table.contains(&tool_name) {
                    match self.duplicates {
                        DuplicateToolPolicy::Reject => {
                            return Err(OpenApiToolsError::Config(format!(
                                "Duplicate tool name '{tool_name}' in '{}' ({} {})",
                                self.resource_name,
                                method,
                                path
                            )));
                        }
                        DuplicateToolPolicy::Overwrite => {
                            tracing::warn!(
                                backend = %self.resource_name,
                                tool = %tool_name,
                                method = %method,
                                path = %path,
                                "Duplicate tool name; later operation replaces the earlier one"
                            );
                        }
                    }
                }

                table.insert(Route {
                    tool_name,
                    path: path.clone(),
                    method,
                    operation,
                });
            }
        }

        tracing::info!(
            backend = %self.resource_name,
            routes = table.len(),
            shared_parameters = registry.len(),
            "Indexed OpenAPI routes"
        );

        Ok(table)
    }

    fn shared_parameters(
        &self,
        path: &str,
        params: Option<&Value>,
        registry: &mut ParameterRegistry,
    ) -> Vec<ParameterDef> {
        let Some(params) = params.and_then(Value::as_array) else {
            return Vec::new();
        };

        let mut shared = Vec::with_capacity(params.len());
        for p in params {
            match ParameterDef::from_value(p) {
                Ok(def) => {
                    registry.register(&def);
                    shared.push(def);
                }
                Err(e) => tracing::warn!(
                    backend = %self.resource_name,
                    path = %path,
                    error = %e,
                    "Dropping unusable path-level parameter"
                ),
            }
        }
        shared
    }

    /// Resolve `{name}` placeholders that no path parameter covers from the shared registry.
    fn attach_missing_path_parameters(
        &self,
        path: &str,
        operation: &mut Operation,
        registry: &ParameterRegistry,
    ) {
        for caps in PLACEHOLDER_RE.captures_iter(path) {
            let name = &caps[1];
            if operation
                .parameters_in(ParamLocation::Path)
                .any(|p| p.name == name)
            {
                continue;
            }
            match registry.get(name) {
                Some(def) if def.location == ParamLocation::Path => {
                    operation.parameters.push(def.clone());
                }
                _ => tracing::warn!(
                    backend = %self.resource_name,
                    path = %path,
                    placeholder = %name,
                    "Path placeholder has no parameter definition"
                ),
            }
        }
    }
}

fn parse_http_method(key: &str) -> Option<Method> {
    let lower = key.to_ascii_lowercase();
    if !VALID_METHODS.contains(&lower.as_str()) {
        return None;
    }
    lower.to_uppercase().parse().ok()
}

/// Path-level parameters first; an operation-level parameter with the same name and location
/// replaces the path-level one in place.
fn merge_parameters(shared: &[ParameterDef], own: Vec<ParameterDef>) -> Vec<ParameterDef> {
    let mut merged = shared.to_vec();
    for p in own {
        if let Some(existing) = merged
            .iter_mut()
            .find(|s| s.name == p.name && s.location == p.location)
        {
            *existing = p;
        } else {
            merged.push(p);
        }
    }
    merged
}

/// Generate a tool name from method and path for operations without an `operationId`.
fn generate_canonical_name(method: &str, path: &str) -> String {
    let name = format!("{}_{}", method.to_lowercase(), path);
    let name = PLACEHOLDER_RE.replace_all(&name, "_$1");
    let name = NON_ALNUM_RE.replace_all(&name, "_");
    let mut name = name.trim_matches('_').to_string();
    name.truncate(64);
    name
}
