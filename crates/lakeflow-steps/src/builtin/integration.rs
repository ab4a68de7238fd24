use futures::future::BoxFuture;
use tracing::info;

use lakeflow_core::error::{LakeflowError, Result};
use lakeflow_core::state::{RunState, StepResult};
use lakeflow_core::traits::{StepDefinition, StepHandler, StepParam};

/// Builds a scheduler task definition for the periodic sync of the lake table.
///
/// `parallelism` comes from the step config and defaults to 1. The synthesis
/// layer is responsible for keeping requested values inside platform policy;
/// this step takes whatever it is given.
pub struct IntegrationTaskGenerateStep;

impl StepHandler for IntegrationTaskGenerateStep {
    fn name(&self) -> &str {
        "integration_task_generate"
    }

    fn description(&self) -> &str {
        "Generate a scheduler integration task for the lake table sync"
    }

    fn definition(&self) -> StepDefinition {
        StepDefinition {
            name: "integration_task_generate".into(),
            description: self.description().into(),
            category: "integration".into(),
            inputs: vec![
                StepParam::required("table_schema", "Schema produced by table_check", "object"),
                StepParam::optional("parallelism", "Worker parallelism for the sync task", "integer"),
                StepParam::optional("schedule", "Cron-style schedule expression", "string"),
            ],
            outputs: vec![
                StepParam::required("task_id", "Integration task identifier", "string"),
                StepParam::required("task_config", "Full task definition", "object"),
            ],
        }
    }

    fn invoke<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let schema = state
                .result("table_check")
                .and_then(|r| r.field("table_schema"))
                .cloned()
                .ok_or_else(|| LakeflowError::StepExecution {
                    step: "integration_task_generate".into(),
                    message: "no table schema recorded by table_check".into(),
                })?;

            let parallelism = state
                .config_value("integration_task_generate", "parallelism")
                .and_then(|v| v.as_u64())
                .unwrap_or(1);
            let schedule = state
                .config_value("integration_task_generate", "schedule")
                .and_then(|v| v.as_str())
                .unwrap_or("0 2 * * *")
                .to_string();

            let suffix: String = state
                .request_id
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(8)
                .collect::<String>()
                .to_uppercase();
            let task_id = format!("INT-{suffix}-001");

            let table = schema["table"].as_str().unwrap_or("lake_unknown");
            let task_config = serde_json::json!({
                "task_id": task_id,
                "target_table": table,
                "parallelism": parallelism,
                "schedule": schedule,
                "mode": "incremental",
            });

            info!(task_id = %task_id, parallelism, "integration task generated");

            Ok(StepResult::success()
                .with("task_id", serde_json::json!(task_id))
                .with("task_config", task_config))
        })
    }
}

/// Deploys a generated integration task to the (mocked) scheduler.
pub struct IntegrationTaskDeployStep;

impl StepHandler for IntegrationTaskDeployStep {
    fn name(&self) -> &str {
        "integration_task_deploy"
    }

    fn description(&self) -> &str {
        "Deploy the generated integration task to the scheduler"
    }

    fn definition(&self) -> StepDefinition {
        StepDefinition {
            name: "integration_task_deploy".into(),
            description: self.description().into(),
            category: "integration".into(),
            inputs: vec![StepParam::required(
                "task_id",
                "Task produced by integration_task_generate",
                "string",
            )],
            outputs: vec![
                StepParam::required("deployed", "Whether deployment succeeded", "boolean"),
                StepParam::required("scheduler_url", "Where the task is visible", "string"),
            ],
        }
    }

    fn invoke<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let task_id = state
                .result("integration_task_generate")
                .and_then(|r| r.field_str("task_id"))
                .map(String::from)
                .ok_or_else(|| LakeflowError::StepExecution {
                    step: "integration_task_deploy".into(),
                    message: "no task recorded by integration_task_generate".into(),
                })?;

            let scheduler_url = format!("https://scheduler.internal/tasks/{task_id}");
            info!(task_id = %task_id, "integration task deployed");

            Ok(StepResult::success()
                .with("deployed", serde_json::json!(true))
                .with("task_id", serde_json::json!(task_id))
                .with("scheduler_url", serde_json::json!(scheduler_url)))
        })
    }
}
