use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use lakeflow_core::config::ExecutorConfig;
use lakeflow_core::error::{LakeflowError, Result};
use lakeflow_core::state::ExecutionReport;
use lakeflow_core::types::WorkflowSpec;
use lakeflow_steps::StepRegistry;

use crate::compiler::CompiledWorkflow;
use crate::executor::WorkflowExecutor;

/// A registered workflow, summarized for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub description: String,
    pub step_count: usize,
    pub transition_count: usize,
}

/// In-memory registry of workflows, keyed by name.
///
/// Registration compiles the workflow and keeps the compiled form, so invalid
/// workflows are rejected up front and `execute` never recompiles.
pub struct WorkflowStore {
    registry: Arc<StepRegistry>,
    executor: WorkflowExecutor,
    workflows: RwLock<HashMap<String, CompiledWorkflow>>,
}

impl WorkflowStore {
    pub fn new(registry: Arc<StepRegistry>, config: &ExecutorConfig) -> Self {
        Self {
            executor: WorkflowExecutor::new(registry.clone(), config),
            registry,
            workflows: RwLock::new(HashMap::new()),
        }
    }

    /// Store with the built-in step set and the standard ingestion workflow.
    pub async fn with_defaults(config: &ExecutorConfig) -> Result<Self> {
        let store = Self::new(Arc::new(StepRegistry::with_builtins()), config);
        store.register(crate::presets::standard_lake_ingestion()).await?;
        Ok(store)
    }

    /// Register a workflow, replacing any previous one with the same name.
    pub async fn register(&self, spec: WorkflowSpec) -> Result<()> {
        let name = spec.name.clone();
        let compiled = CompiledWorkflow::compile(spec, &self.registry, None)?;
        info!(workflow = %name, steps = compiled.spec.steps.len(), "workflow registered");
        self.workflows.write().await.insert(name, compiled);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<WorkflowSpec> {
        self.workflows
            .read()
            .await
            .get(name)
            .map(|c| c.spec.clone())
    }

    pub async fn list(&self) -> Vec<WorkflowSummary> {
        let mut summaries: Vec<WorkflowSummary> = self
            .workflows
            .read()
            .await
            .values()
            .map(|c| &c.spec)
            .map(|spec| WorkflowSummary {
                name: spec.name.clone(),
                description: spec.description.clone(),
                step_count: spec.steps.len(),
                transition_count: spec.transitions.len(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Re-register a workflow under its name. Idempotent.
    pub async fn update(&self, spec: WorkflowSpec) -> Result<()> {
        self.register(spec).await
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        match self.workflows.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(LakeflowError::WorkflowNotFound(name.to_string())),
        }
    }

    /// Execute a registered workflow with a fresh request id.
    ///
    /// Uses the compiled form cached at registration; nothing is recompiled.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Map<String, serde_json::Value>,
        custom_params: serde_json::Map<String, serde_json::Value>,
    ) -> Result<ExecutionReport> {
        let compiled = self
            .workflows
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| LakeflowError::WorkflowNotFound(name.to_string()))?;
        let request_id = Uuid::new_v4().simple().to_string();
        Ok(self
            .executor
            .execute(&compiled, request_id, input, custom_params)
            .await)
    }
}
