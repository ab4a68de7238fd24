use futures::future::BoxFuture;
use rand::Rng;
use tracing::{info, warn};

use lakeflow_core::error::Result;
use lakeflow_core::state::{RunState, StepResult};
use lakeflow_core::traits::{StepDefinition, StepHandler, StepParam};

const DEFAULT_RULES: &[&str] = &[
    "primary_key_defined",
    "partition_column_present",
    "no_reserved_column_names",
    "row_count_within_quota",
];

/// Pre-ingestion compliance check of the source table.
///
/// Rules come from the step config (`rules`, array of strings) and fall back
/// to a standard set. Each rule passes or fails by a mocked roll driven by
/// `failure_rate`, so the remediation loop can be exercised deterministically
/// from config.
pub struct TableCheckStep;

impl TableCheckStep {
    fn rules(state: &RunState) -> Vec<String> {
        match state.config_value("table_check", "rules").and_then(|v| v.as_array()) {
            Some(values) => values
                .iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect(),
            None => DEFAULT_RULES.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn failure_rate(state: &RunState) -> f64 {
        state
            .config_value("table_check", "failure_rate")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
    }

    fn mock_schema(lake_table: &str) -> serde_json::Value {
        serde_json::json!({
            "table": lake_table,
            "columns": [
                {"name": "id", "type": "bigint", "primary_key": true},
                {"name": "order_no", "type": "varchar(64)"},
                {"name": "amount", "type": "decimal(18,2)"},
                {"name": "dt", "type": "date", "partition": true},
            ],
        })
    }
}

impl StepHandler for TableCheckStep {
    fn name(&self) -> &str {
        "table_check"
    }

    fn description(&self) -> &str {
        "Check the source table against ingestion compliance rules"
    }

    fn definition(&self) -> StepDefinition {
        StepDefinition {
            name: "table_check".into(),
            description: self.description().into(),
            category: "validation".into(),
            inputs: vec![
                StepParam::optional("rules", "Compliance rules to evaluate", "array"),
                StepParam::optional("failure_rate", "Mocked per-rule failure probability", "number"),
            ],
            outputs: vec![
                StepParam::required("check_result", "pass or fail", "string"),
                StepParam::required("table_schema", "Schema of the checked table", "object"),
                StepParam::optional("failed_rules", "Rules that did not pass", "array"),
                StepParam::optional("error_message", "Failure summary", "string"),
            ],
        }
    }

    fn invoke<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let rules = Self::rules(state);
            let failure_rate = Self::failure_rate(state);

            let lake_table = state
                .result("page_submit")
                .and_then(|r| r.field_str("lake_table"))
                .unwrap_or("lake_unknown")
                .to_string();

            let mut rng = rand::thread_rng();
            let failed: Vec<String> = rules
                .iter()
                .filter(|_| rng.gen_bool(failure_rate))
                .cloned()
                .collect();

            let schema = Self::mock_schema(&lake_table);

            if failed.is_empty() {
                info!(table = %lake_table, rules = rules.len(), "table check passed");
                Ok(StepResult::success()
                    .with("check_result", serde_json::json!("pass"))
                    .with("checked_rules", serde_json::json!(rules))
                    .with("table_schema", schema))
            } else {
                warn!(table = %lake_table, failed = ?failed, "table check failed");
                let message = format!("{} rule(s) failed: {}", failed.len(), failed.join(", "));
                Ok(StepResult::failed()
                    .with("check_result", serde_json::json!("fail"))
                    .with("checked_rules", serde_json::json!(rules))
                    .with("failed_rules", serde_json::json!(failed))
                    .with("error_message", serde_json::json!(message))
                    .with("table_schema", schema))
            }
        })
    }
}
