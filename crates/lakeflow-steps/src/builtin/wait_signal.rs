use futures::future::BoxFuture;
use tracing::debug;

use lakeflow_core::error::Result;
use lakeflow_core::state::{RunState, StepResult};
use lakeflow_core::traits::{StepDefinition, StepHandler, StepParam};

/// Mocked wait point. A real deployment would park here until an external
/// signal arrives; the mock resolves immediately.
///
/// Deliberately not named with a "gateway" suffix: gateway-suffixed step ids
/// resolve to passthrough no-ops and would never reach this handler.
pub struct WaitSignalStep;

impl StepHandler for WaitSignalStep {
    fn name(&self) -> &str {
        "wait_signal"
    }

    fn description(&self) -> &str {
        "Wait for an external completion signal"
    }

    fn definition(&self) -> StepDefinition {
        StepDefinition {
            name: "wait_signal".into(),
            description: self.description().into(),
            category: "control".into(),
            inputs: vec![StepParam::optional(
                "wait_for",
                "What the step waits on",
                "string",
            )],
            outputs: vec![StepParam::required("waited", "Signal received", "boolean")],
        }
    }

    fn invoke<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepResult>> {
        Box::pin(async move {
            let wait_for = state
                .config_value("wait_signal", "wait_for")
                .and_then(|v| v.as_str())
                .unwrap_or("upstream_completion");
            debug!(wait_for, "wait signal released");
            Ok(StepResult::success()
                .with("waited", serde_json::json!(true))
                .with("wait_for", serde_json::json!(wait_for)))
        })
    }
}
