use std::collections::HashMap;
use std::sync::Arc;

use lakeflow_core::error::{LakeflowError, Result};
use lakeflow_core::state::{RunState, StepResult};
use lakeflow_core::traits::{StepDefinition, StepHandler};

/// Registry of available step types.
pub struct StepRegistry {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a step handler under its own name.
    pub fn register(&mut self, handler: impl StepHandler) {
        let name = handler.name().to_string();
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Whether a handler exists for a step type.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Get a handler by step type name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(name).cloned()
    }

    /// List registered step type names.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }

    /// Step definitions for prompting the generator.
    pub fn definitions(&self) -> Vec<StepDefinition> {
        let mut defs: Vec<StepDefinition> =
            self.handlers.values().map(|h| h.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Run a step by type name against the current state.
    pub async fn invoke(&self, name: &str, state: &RunState) -> Result<StepResult> {
        let handler = self.get(name).ok_or_else(|| LakeflowError::UnknownStepType {
            step: name.to_string(),
        })?;
        handler.invoke(state).await
    }

    /// Registry with all built-in lake-ingestion steps registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(crate::builtin::page_submit::PageSubmitStep);
        registry.register(crate::builtin::table_check::TableCheckStep);
        registry.register(crate::builtin::analyze::AnalyzeStep);
        registry.register(crate::builtin::sql::SqlGenerateStep);
        registry.register(crate::builtin::sql::SqlExecuteStep);
        registry.register(crate::builtin::integration::IntegrationTaskGenerateStep);
        registry.register(crate::builtin::integration::IntegrationTaskDeployStep);
        registry.register(crate::builtin::artifact::ArtifactGenerateStep);
        registry.register(crate::builtin::wait_signal::WaitSignalStep);

        registry
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}
