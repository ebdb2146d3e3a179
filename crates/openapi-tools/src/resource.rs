//! The interface a protocol server uses to talk to tool providers.

use crate::error::OpenApiToolsError;
use crate::executor::error_result;
use crate::runtime::OpenApiResource;
use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use serde_json::Value;
use std::sync::Arc;

/// A named provider of tools.
#[async_trait]
pub trait ToolResource: Send + Sync {
    fn name(&self) -> &str;

    fn list_tools(&self) -> Vec<Tool>;

    /// Whether `tool` is one of this resource's tools.
    fn has_tool(&self, tool: &str) -> bool {
        self.list_tools().iter().any(|t| t.name == tool)
    }

    /// Invoke `tool`. Failures are reported as error results, never as `Err`.
    async fn invoke(&self, tool: &str, args: Value) -> CallToolResult;
}

#[async_trait]
impl ToolResource for OpenApiResource {
    fn name(&self) -> &str {
        OpenApiResource::name(self)
    }

    fn list_tools(&self) -> Vec<Tool> {
        OpenApiResource::list_tools(self)
    }

    fn has_tool(&self, tool: &str) -> bool {
        self.route(tool).is_some()
    }

    async fn invoke(&self, tool: &str, args: Value) -> CallToolResult {
        self.execute(tool, args).await
    }
}

/// Several resources behind one catalog. The first resource that lists a tool name owns it.
#[derive(Default, Clone)]
pub struct ResourceSet {
    resources: Vec<Arc<dyn ToolResource>>,
}

impl ResourceSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Arc<dyn ToolResource>) {
        self.resources.push(resource);
    }

    #[must_use]
    pub fn with(mut self, resource: Arc<dyn ToolResource>) -> Self {
        self.add(resource);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Every resource's tools, in registration order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.resources.iter().flat_map(|r| r.list_tools()).collect()
    }

    fn owner(&self, tool: &str) -> Option<&Arc<dyn ToolResource>> {
        self.resources.iter().find(|r| r.has_tool(tool))
    }

    pub async fn invoke(&self, tool: &str, args: Value) -> CallToolResult {
        match self.owner(tool) {
            Some(resource) => {
                tracing::debug!(resource = %resource.name(), tool = %tool, "Dispatching tool call");
                resource.invoke(tool, args).await
            }
            None => error_result(&OpenApiToolsError::ToolNotFound(tool.to_string())),
        }
    }
}
