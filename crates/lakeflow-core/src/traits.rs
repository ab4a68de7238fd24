use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::{RunState, StepResult};

/// Generative-text service — one prompt in, untrusted text out.
pub trait TextGenerator: Send + Sync + 'static {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// A typed parameter in a step's input/output contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepParam {
    pub name: String,
    pub description: String,
    pub data_type: String,
    #[serde(default)]
    pub required: bool,
}

impl StepParam {
    pub fn required(name: &str, description: &str, data_type: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            data_type: data_type.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, description: &str, data_type: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            data_type: data_type.into(),
            required: false,
        }
    }
}

/// Metadata describing a step type — fed to the generator so it knows the
/// available building blocks and their parameter contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub inputs: Vec<StepParam>,
    #[serde(default)]
    pub outputs: Vec<StepParam>,
}

/// A unit of work in a workflow. Pure with respect to the run state: reads
/// upstream results, returns exactly one result for its own id.
pub trait StepHandler: Send + Sync + 'static {
    /// Step type name (matched against declared step ids).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Parameter contract, used when prompting the generator.
    fn definition(&self) -> StepDefinition;

    /// Run the step against the current state.
    fn invoke<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepResult>>;
}

/// A parameter of an inspection tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub description: String,
    pub data_type: String,
    #[serde(default)]
    pub required: bool,
}

impl ToolParam {
    pub fn required(name: &str, description: &str, data_type: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            data_type: data_type.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, description: &str, data_type: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            data_type: data_type.into(),
            required: false,
        }
    }
}

/// A tool the validator dialogue may invoke while checking a workflow.
pub trait InspectionTool: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Vec<ToolParam>;

    fn invoke<'a>(
        &'a self,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'a, Result<serde_json::Value>>;
}
