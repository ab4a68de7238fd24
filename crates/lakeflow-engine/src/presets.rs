use lakeflow_core::types::{Condition, StepConfig, Transition, WorkflowSpec};

/// The standard lake ingestion workflow.
///
/// Eight steps: intake, compliance check, failure analysis with a remediation
/// loop back into the check, SQL generation and execution, integration task
/// generation and deployment, and the final artifact. The remediation loop is
/// bounded by the executor's visit limit.
pub fn standard_lake_ingestion() -> WorkflowSpec {
    let mut integration_config = StepConfig::new();
    integration_config.insert("parallelism".into(), serde_json::json!(2));
    integration_config.insert("schedule".into(), serde_json::json!("0 2 * * *"));

    let mut artifact_config = StepConfig::new();
    artifact_config.insert("artifact_type".into(), serde_json::json!("ingestion_report"));

    WorkflowSpec::new("standard_lake_ingestion")
        .with_description("Ingest a source table into the lake with compliance checks")
        .with_steps([
            "page_submit",
            "table_check",
            "analyze",
            "sql_generate",
            "sql_execute",
            "integration_task_generate",
            "integration_task_deploy",
            "artifact_generate",
        ])
        .with_transitions(vec![
            Transition::new("page_submit", "table_check"),
            Transition::on_failure("table_check", "analyze"),
            Transition::on_success("table_check", "sql_generate"),
            // Remediation loop: after analysis, re-run the check
            Transition {
                from: "analyze".into(),
                to: "table_check".into(),
                condition: Some(Condition::Equals {
                    field: "is_blocked".into(),
                    value: serde_json::json!(true),
                }),
            },
            Transition::new("analyze", "sql_generate"),
            Transition::new("sql_generate", "sql_execute"),
            Transition::new("sql_execute", "integration_task_generate"),
            Transition::new("integration_task_generate", "integration_task_deploy"),
            Transition::new("integration_task_deploy", "artifact_generate"),
        ])
        .with_step_config("integration_task_generate", integration_config)
        .with_step_config("artifact_generate", artifact_config)
}
