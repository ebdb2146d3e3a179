//! Tool catalog snapshots, for checking a generated catalog against a committed one.

use crate::error::Result;
use rmcp::model::Tool;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// `{"tools": [...]}` as written to and read from snapshot files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCatalog {
    pub tools: Vec<Value>,
}

impl ToolCatalog {
    /// # Errors
    ///
    /// Returns an error if a tool cannot be serialized.
    pub fn from_tools(tools: &[Tool]) -> Result<Self> {
        let tools = tools
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { tools })
    }

    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter_map(|t| t.get("name").and_then(Value::as_str))
            .collect()
    }

    /// # Errors
    ///
    /// Returns an error if the catalog cannot be serialized.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold a catalog.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut text = self.to_json_pretty()?;
        text.push('\n');
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Whether the snapshot at `path` matches this catalog. A missing file is out of date.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn is_up_to_date(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let stored = Self::load(path)?;
        if stored != *self {
            tracing::warn!(
                snapshot = %path.display(),
                stored = stored.tools.len(),
                current = self.tools.len(),
                "Tool catalog snapshot is out of date"
            );
            return Ok(false);
        }
        Ok(true)
    }
}
