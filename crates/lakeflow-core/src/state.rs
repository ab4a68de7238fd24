use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{StepConfig, WorkflowSpec};

/// Outcome status of a single step run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// The record a step writes under its own id before returning.
///
/// Step-specific output lives in `fields`; `status` is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StepResult {
    pub fn success() -> Self {
        Self {
            status: StepStatus::Success,
            fields: serde_json::Map::new(),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: StepStatus::Failed,
            fields: serde_json::Map::new(),
        }
    }

    /// Attach an output field.
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Look up an output field.
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// The status as its wire string.
    pub fn status_str(&self) -> &'static str {
        match self.status {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
        }
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// The shared record threaded through one workflow execution.
///
/// `results` only grows; steps read upstream entries by id and write exactly
/// one entry under their own id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub request_id: String,
    pub workflow: String,
    #[serde(default)]
    pub input: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub custom_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub results: HashMap<String, StepResult>,
    pub current_step: String,
    #[serde(default)]
    pub step_configs: HashMap<String, StepConfig>,
}

impl RunState {
    pub fn new(
        request_id: impl Into<String>,
        spec: &WorkflowSpec,
        entry: impl Into<String>,
        input: serde_json::Map<String, serde_json::Value>,
        custom_params: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            workflow: spec.name.clone(),
            input,
            custom_params,
            results: HashMap::new(),
            current_step: entry.into(),
            step_configs: spec.step_configs.clone(),
        }
    }

    /// The recorded result of a step, if it has run.
    pub fn result(&self, step: &str) -> Option<&StepResult> {
        self.results.get(step)
    }

    /// Record a step's result under its id.
    pub fn insert_result(&mut self, step: impl Into<String>, result: StepResult) {
        self.results.insert(step.into(), result);
    }

    /// A configuration value for a step, if configured.
    pub fn config_value(&self, step: &str, key: &str) -> Option<&serde_json::Value> {
        self.step_configs.get(step).and_then(|c| c.get(key))
    }

    /// An input field from the initial payload.
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(|v| v.as_str())
    }
}

/// Final status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

/// An error recorded during execution, attributed to a step when possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub message: String,
}

/// What one workflow execution produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub request_id: String,
    pub workflow: String,
    pub status: ExecutionStatus,
    pub results: HashMap<String, StepResult>,
    #[serde(default)]
    pub errors: Vec<ExecutionError>,
    pub elapsed_ms: u64,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}
