use futures::future::BoxFuture;
use tracing::info;

use lakeflow_core::error::Result;
use lakeflow_core::state::{RunState, StepResult};
use lakeflow_core::traits::{StepDefinition, StepHandler, StepParam};

/// Analyzes a failed table check and proposes remediation.
///
/// Reads the recorded `table_check` result. When that check failed, emits a
/// per-rule remediation suggestion and marks the run as blocked so a
/// remediation edge can route back into the check.
pub struct AnalyzeStep;

fn suggestion_for(rule: &str) -> String {
    match rule {
        "primary_key_defined" => "Add a primary key to the source table before ingestion".into(),
        "partition_column_present" => {
            "Declare a date partition column (e.g. dt) on the source table".into()
        }
        "no_reserved_column_names" => "Rename columns that collide with reserved words".into(),
        "row_count_within_quota" => "Request a quota increase or filter the source extract".into(),
        other => format!("Review rule '{other}' against the ingestion guidelines"),
    }
}

impl StepHandler for AnalyzeStep {
    fn name(&self) -> &str {
        "analyze"
    }

    fn description(&self) -> &str {
        "Analyze check failures and produce remediation suggestions"
    }

    fn definition(&self) -> StepDefinition {
        StepDefinition {
            name: "analyze".into(),
            description: self.description().into(),
            category: "analysis".into(),
            inputs: vec![StepParam::optional(
                "table_check",
                "Upstream check result to analyze",
                "object",
            )],
            outputs: vec![
                StepParam::required("analysis", "Human-readable analysis", "string"),
                StepParam::required("is_blocked", "Whether ingestion is blocked", "boolean"),
                StepParam::optional("suggestions", "Remediation suggestions", "array"),
            ],
        }
    }

    fn invoke<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let check = state.result("table_check");

            let failed_rules: Vec<String> = check
                .and_then(|r| r.field("failed_rules"))
                .and_then(|v| v.as_array())
                .map(|rules| {
                    rules
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            if failed_rules.is_empty() {
                info!("nothing to remediate");
                return Ok(StepResult::success()
                    .with("analysis", serde_json::json!("No compliance issues found"))
                    .with("is_blocked", serde_json::json!(false)));
            }

            let suggestions: Vec<String> =
                failed_rules.iter().map(|r| suggestion_for(r)).collect();
            let analysis = format!(
                "Table check failed {} rule(s); remediation required before ingestion",
                failed_rules.len()
            );
            info!(failed = failed_rules.len(), "remediation suggestions produced");

            Ok(StepResult::success()
                .with("analysis", serde_json::json!(analysis))
                .with("is_blocked", serde_json::json!(true))
                .with("failed_rules", serde_json::json!(failed_rules))
                .with("suggestions", serde_json::json!(suggestions)))
        })
    }
}
