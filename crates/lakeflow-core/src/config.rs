use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LakeflowError, Result};

/// Top-level Lakeflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl AppConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LakeflowError::Config(e.to_string()))
    }
}

/// Generative-text service configuration (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "LAKEFLOW_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_max_retries() -> u32 {
    2
}
fn default_initial_backoff_ms() -> u64 {
    500
}

/// Synthesis loop budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Round budget for interactive synthesis.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Round budget for batch synthesis.
    #[serde(default = "default_batch_max_rounds")]
    pub batch_max_rounds: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            batch_max_rounds: default_batch_max_rounds(),
        }
    }
}

fn default_max_rounds() -> usize {
    5
}
fn default_batch_max_rounds() -> usize {
    3
}

/// Validator dialogue budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Think/act round budget for the tool-using validator.
    #[serde(default = "default_validator_rounds")]
    pub max_rounds: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_validator_rounds(),
        }
    }
}

fn default_validator_rounds() -> usize {
    10
}

/// Executor bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// How many times a single step may run within one execution before the
    /// execution is aborted. Bounds remediation self-loops.
    #[serde(default = "default_max_step_visits")]
    pub max_step_visits: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_step_visits: default_max_step_visits(),
        }
    }
}

fn default_max_step_visits() -> usize {
    5
}
