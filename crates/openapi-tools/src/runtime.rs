//! `OpenAPI`-backed tool resource: route table + tool catalog + executor behind one handle.

use crate::auth::AuthProvider;
use crate::config::ResourceConfig;
use crate::document::ApiDocument;
use crate::error::{OpenApiToolsError, Result};
use crate::executor::{RequestExecutor, error_result};
use crate::indexer::{Route, RouteIndexer, RouteTable};
use crate::schema::{SchemaGenerator, ToolDefinition};
use crate::semantics::annotations_for_method;
use parking_lot::RwLock;
use reqwest::Client;
use rmcp::model::{CallToolResult, Tool};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Routes and the tool definitions generated from them. Replaced as a whole on re-index.
#[derive(Debug, Default)]
struct Catalog {
    routes: RouteTable,
    definitions: Vec<ToolDefinition>,
}

/// Tool registry for one `OpenAPI` document.
#[derive(Debug)]
pub struct OpenApiResource {
    name: String,
    indexer: RouteIndexer,
    generator: SchemaGenerator,
    executor: RequestExecutor,
    catalog: RwLock<Arc<Catalog>>,
}

impl OpenApiResource {
    /// Index `doc` and prepare an executor for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable host is configured or derivable from the document, the
    /// HTTP client cannot be built, a static header is invalid, or indexing rejects a duplicate
    /// tool name.
    pub fn new(config: &ResourceConfig, doc: &ApiDocument) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| OpenApiToolsError::Config(format!("HTTP client: {e}")))?;
        let auth = AuthProvider::new(config.auth.clone(), config.login_url.clone(), client.clone());
        Self::with_auth(config, doc, client, auth)
    }

    /// Like [`Self::new`] with a caller-supplied client and auth provider (e.g. to share a token
    /// cache between resources).
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn with_auth(
        config: &ResourceConfig,
        doc: &ApiDocument,
        client: Client,
        auth: AuthProvider,
    ) -> Result<Self> {
        let host = resolve_host(config, doc)?;
        let mut static_headers: Vec<(String, String)> = config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        static_headers.sort();

        let executor = RequestExecutor::new(
            config.name.clone(),
            host,
            client,
            auth,
            &config.user_agent,
            &static_headers,
        )?
        .with_timeout(config.timeout_secs.map(Duration::from_secs))
        .with_token_eviction(config.evict_token_on_unauthorized);

        let resource = Self {
            name: config.name.clone(),
            indexer: RouteIndexer::new(config.name.clone(), config.duplicate_tool_names),
            generator: SchemaGenerator::new(config.name.clone()),
            executor,
            catalog: RwLock::new(Arc::new(Catalog::default())),
        };
        resource.reindex(doc)?;
        Ok(resource)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn host(&self) -> &str {
        self.executor.host()
    }

    #[must_use]
    pub fn auth(&self) -> &AuthProvider {
        self.executor.auth()
    }

    /// Rebuild routes and tool definitions from `doc`. On error the previous catalog stays.
    ///
    /// # Errors
    ///
    /// Returns an error if indexing fails.
    pub fn reindex(&self, doc: &ApiDocument) -> Result<()> {
        let routes = self.indexer.index(doc)?;
        let definitions: Vec<ToolDefinition> = routes
            .iter()
            .map(|r| self.generator.tool_definition(r))
            .collect();

        tracing::info!(
            "Discovered {} tools from OpenAPI document '{}'",
            definitions.len(),
            self.name
        );

        *self.catalog.write() = Arc::new(Catalog {
            routes,
            definitions,
        });
        Ok(())
    }

    #[must_use]
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.catalog.read().definitions.clone()
    }

    #[must_use]
    pub fn route(&self, tool_name: &str) -> Option<Arc<Route>> {
        self.catalog.read().routes.get(tool_name)
    }

    /// List the MCP `Tool`s exposed by this resource.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        let catalog = Arc::clone(&self.catalog.read());
        catalog
            .definitions
            .iter()
            .map(|def| {
                let mut tool = Tool::new(
                    def.name.clone(),
                    def.description.clone(),
                    Arc::new(def.input_schema.to_json_object()),
                );
                if let Some(route) = catalog.routes.get(&def.name) {
                    tool.annotations = Some(annotations_for_method(&route.method));
                }
                tool
            })
            .collect()
    }

    /// Execute a tool call. Never fails: every error becomes an error result.
    pub async fn execute(&self, name: &str, args: Value) -> CallToolResult {
        // Clone the route out so no lock is held across the await.
        let Some(route) = self.route(name) else {
            let e = OpenApiToolsError::ToolNotFound(name.to_string());
            tracing::warn!(backend = %self.name, error = %e, "Unknown tool");
            return error_result(&e);
        };
        self.executor.execute(&route, &args).await
    }
}

/// Configured host, else the document's first server. Must be an absolute http(s) URL.
fn resolve_host(config: &ResourceConfig, doc: &ApiDocument) -> Result<String> {
    let host = config
        .host
        .as_deref()
        .or_else(|| doc.first_server_url())
        .ok_or_else(|| {
            OpenApiToolsError::Config(format!(
                "No host configured for '{}' and none found in the document",
                config.name
            ))
        })?;

    if host.starts_with("http://") || host.starts_with("https://") {
        Ok(host.to_string())
    } else {
        Err(OpenApiToolsError::Config(format!(
            "Invalid host '{host}' for '{}': must be an absolute http(s) URL",
            config.name
        )))
    }
}
