use chrono::Utc;
use futures::future::BoxFuture;
use tracing::info;

use lakeflow_core::error::Result;
use lakeflow_core::state::{RunState, StepResult};
use lakeflow_core::traits::{StepDefinition, StepHandler, StepParam};

/// Accepts an ingestion request and opens a ticket for it.
pub struct PageSubmitStep;

impl StepHandler for PageSubmitStep {
    fn name(&self) -> &str {
        "page_submit"
    }

    fn description(&self) -> &str {
        "Accept an ingestion request from the portal and open a tracking ticket"
    }

    fn definition(&self) -> StepDefinition {
        StepDefinition {
            name: "page_submit".into(),
            description: self.description().into(),
            category: "intake".into(),
            inputs: vec![
                StepParam::required("user_input", "Free-form ingestion request", "string"),
                StepParam::optional("username", "Requesting user", "string"),
            ],
            outputs: vec![
                StepParam::required("ticket_id", "Tracking ticket identifier", "string"),
                StepParam::required("source_db", "Source database name", "string"),
                StepParam::required("source_table", "Source table name", "string"),
                StepParam::required("lake_table", "Target lake table name", "string"),
            ],
        }
    }

    fn invoke<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let user_input = state.input_str("user_input").unwrap_or("").to_string();
            let username = state.input_str("username").unwrap_or("anonymous").to_string();

            let suffix: String = state
                .request_id
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(8)
                .collect::<String>()
                .to_uppercase();
            let ticket_id = format!("TICKET-{suffix}");

            let source_db = state.input_str("source_db").unwrap_or("ods_orders").to_string();
            let source_table = state.input_str("source_table").unwrap_or("order_detail").to_string();
            let lake_table = format!("lake_{source_db}_{source_table}");

            info!(ticket_id = %ticket_id, username = %username, "ingestion request submitted");

            Ok(StepResult::success()
                .with("ticket_id", serde_json::json!(ticket_id))
                .with("username", serde_json::json!(username))
                .with("user_input", serde_json::json!(user_input))
                .with("source_db", serde_json::json!(source_db))
                .with("source_table", serde_json::json!(source_table))
                .with("lake_table", serde_json::json!(lake_table))
                .with("submitted_at", serde_json::json!(Utc::now().to_rfc3339())))
        })
    }
}
