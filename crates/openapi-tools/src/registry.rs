//! Registry of shared (path-level) parameter definitions.

use crate::document::ParameterDef;
use std::collections::HashMap;

/// Deduplicated store of path-level parameter definitions, keyed by name.
///
/// The first registration of a name wins; later definitions with the same name are ignored.
#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    by_name: HashMap<String, ParameterDef>,
}

impl ParameterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Returns `true` if the name was new.
    pub fn register(&mut self, def: &ParameterDef) -> bool {
        if self.by_name.contains_key(&def.name) {
            return false;
        }
        self.by_name.insert(def.name.clone(), def.clone());
        true
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterDef> {
        self.by_name.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
