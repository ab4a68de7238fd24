use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use lakeflow_core::config::ExecutorConfig;
use lakeflow_core::state::{
    ExecutionError, ExecutionReport, ExecutionStatus, RunState, StepResult,
};
use lakeflow_core::types::StepKind;
use lakeflow_steps::StepRegistry;

use crate::compiler::CompiledWorkflow;

/// Executes a compiled workflow one step at a time.
///
/// The walk starts at the entry step, records each step's result under its id,
/// and follows the first matching outgoing transition. A step that errors
/// fails the execution; results recorded before the failure are kept in the
/// report. A single step may run at most `max_step_visits` times, which bounds
/// remediation self-loops.
pub struct WorkflowExecutor {
    registry: Arc<StepRegistry>,
    max_step_visits: usize,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<StepRegistry>, config: &ExecutorConfig) -> Self {
        Self {
            registry,
            max_step_visits: config.max_step_visits,
        }
    }

    pub async fn execute(
        &self,
        workflow: &CompiledWorkflow,
        request_id: impl Into<String>,
        input: serde_json::Map<String, serde_json::Value>,
        custom_params: serde_json::Map<String, serde_json::Value>,
    ) -> ExecutionReport {
        let start = Instant::now();
        let request_id = request_id.into();
        let mut state = RunState::new(&request_id, &workflow.spec, &workflow.entry, input, custom_params);
        let mut errors: Vec<ExecutionError> = Vec::new();
        let mut visits: HashMap<String, usize> = HashMap::new();

        info!(
            workflow = %workflow.spec.name,
            request_id = %request_id,
            entry = %workflow.entry,
            "executing workflow"
        );

        loop {
            let step = state.current_step.clone();

            let seen = visits.entry(step.clone()).or_insert(0);
            *seen += 1;
            if *seen > self.max_step_visits {
                warn!(
                    step = %step,
                    limit = self.max_step_visits,
                    "step visit limit exceeded, aborting execution"
                );
                errors.push(ExecutionError {
                    step: Some(step.clone()),
                    message: format!(
                        "step '{}' ran more than {} times",
                        step, self.max_step_visits
                    ),
                });
                break;
            }

            let result = match workflow.kind(&step) {
                // Passthrough steps forward the state unchanged
                Some(StepKind::Passthrough) => {
                    debug!(step = %step, "passthrough step");
                    StepResult::success()
                }
                Some(StepKind::Task) => match self.registry.invoke(&step, &state).await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(step = %step, error = %e, "step failed");
                        errors.push(ExecutionError {
                            step: Some(step.clone()),
                            message: e.to_string(),
                        });
                        state.insert_result(
                            &step,
                            StepResult::failed()
                                .with("error_message", serde_json::json!(e.to_string())),
                        );
                        break;
                    }
                },
                // Unreachable after compilation, but routing there is not worth a panic
                None => {
                    errors.push(ExecutionError {
                        step: Some(step.clone()),
                        message: format!("step '{step}' is not declared"),
                    });
                    break;
                }
            };

            debug!(step = %step, status = result.status_str(), "step complete");
            state.insert_result(&step, result);

            match workflow.next(&step, state.result(&step)) {
                Some(next) => {
                    state.current_step = next.to_string();
                }
                None => {
                    debug!(step = %step, "no outgoing transition matched, workflow complete");
                    break;
                }
            }
        }

        let status = if errors.is_empty() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            workflow = %workflow.spec.name,
            request_id = %request_id,
            status = ?status,
            steps = state.results.len(),
            elapsed_ms,
            "workflow finished"
        );

        ExecutionReport {
            request_id,
            workflow: workflow.spec.name.clone(),
            status,
            results: state.results,
            errors,
            elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use lakeflow_core::error::{LakeflowError, Result};
    use lakeflow_core::traits::{StepDefinition, StepHandler, StepParam};
    use lakeflow_core::types::{Condition, StepDecl, Transition, WorkflowSpec};

    fn def(name: &str) -> StepDefinition {
        StepDefinition {
            name: name.into(),
            description: String::new(),
            category: "test".into(),
            inputs: Vec::<StepParam>::new(),
            outputs: Vec::<StepParam>::new(),
        }
    }

    struct Recorder(&'static str);

    impl StepHandler for Recorder {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "records itself"
        }
        fn definition(&self) -> StepDefinition {
            def(self.0)
        }
        fn invoke<'a>(&'a self, _state: &'a RunState) -> BoxFuture<'a, Result<StepResult>> {
            Box::pin(async move { Ok(StepResult::success().with("ran", serde_json::json!(self.0))) })
        }
    }

    struct Failing(&'static str);

    impl StepHandler for Failing {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "always errors"
        }
        fn definition(&self) -> StepDefinition {
            def(self.0)
        }
        fn invoke<'a>(&'a self, _state: &'a RunState) -> BoxFuture<'a, Result<StepResult>> {
            Box::pin(async move {
                Err(LakeflowError::StepExecution {
                    step: self.0.to_string(),
                    message: "boom".into(),
                })
            })
        }
    }

    /// Records a failed result (not an error) so failure edges can route.
    struct SoftFail(&'static str);

    impl StepHandler for SoftFail {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "records a failed result"
        }
        fn definition(&self) -> StepDefinition {
            def(self.0)
        }
        fn invoke<'a>(&'a self, _state: &'a RunState) -> BoxFuture<'a, Result<StepResult>> {
            Box::pin(async move { Ok(StepResult::failed()) })
        }
    }

    fn executor(registry: StepRegistry) -> WorkflowExecutor {
        WorkflowExecutor::new(Arc::new(registry), &ExecutorConfig::default())
    }

    fn empty() -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }

    #[tokio::test]
    async fn test_linear_walk() {
        let mut registry = StepRegistry::new();
        registry.register(Recorder("a"));
        registry.register(Recorder("b"));
        registry.register(Recorder("c"));

        let spec = WorkflowSpec::new("linear")
            .with_steps(["a", "b", "c"])
            .with_transitions(vec![Transition::new("a", "b"), Transition::new("b", "c")]);
        let compiled = CompiledWorkflow::compile(spec, &registry, None).unwrap();

        let report = executor(registry).execute(&compiled, "req-1", empty(), empty()).await;
        assert!(report.succeeded());
        assert_eq!(report.results.len(), 3);
        assert!(report.results["c"].succeeded());
    }

    #[tokio::test]
    async fn test_failure_edge_routing() {
        let mut registry = StepRegistry::new();
        registry.register(SoftFail("check"));
        registry.register(Recorder("remediate"));
        registry.register(Recorder("proceed"));

        let spec = WorkflowSpec::new("branchy")
            .with_steps(["check", "remediate", "proceed"])
            .with_transitions(vec![
                Transition::on_failure("check", "remediate"),
                Transition::on_success("check", "proceed"),
            ]);
        let compiled = CompiledWorkflow::compile(spec, &registry, None).unwrap();

        let report = executor(registry).execute(&compiled, "req-1", empty(), empty()).await;
        // A failed result is data, not an execution error
        assert!(report.succeeded());
        assert!(report.results.contains_key("remediate"));
        assert!(!report.results.contains_key("proceed"));
    }

    #[tokio::test]
    async fn test_step_error_fails_run_and_keeps_prior_results() {
        let mut registry = StepRegistry::new();
        registry.register(Recorder("a"));
        registry.register(Failing("b"));
        registry.register(Recorder("c"));

        let spec = WorkflowSpec::new("erroring")
            .with_steps(["a", "b", "c"])
            .with_transitions(vec![Transition::new("a", "b"), Transition::new("b", "c")]);
        let compiled = CompiledWorkflow::compile(spec, &registry, None).unwrap();

        let report = executor(registry).execute(&compiled, "req-1", empty(), empty()).await;
        assert_eq!(report.status, ExecutionStatus::Failed);
        assert!(report.results["a"].succeeded());
        assert!(!report.results["b"].succeeded());
        assert!(!report.results.contains_key("c"));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].step.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_self_loop_bounded() {
        let mut registry = StepRegistry::new();
        registry.register(SoftFail("check"));
        registry.register(Recorder("fix"));

        // check always fails, fix always routes back: an unbounded loop
        let spec = WorkflowSpec::new("looping")
            .with_steps(["check", "fix"])
            .with_transitions(vec![
                Transition::on_failure("check", "fix"),
                Transition::new("fix", "check"),
            ]);
        let compiled = CompiledWorkflow::compile(spec, &registry, None).unwrap();

        let report = executor(registry).execute(&compiled, "req-1", empty(), empty()).await;
        assert_eq!(report.status, ExecutionStatus::Failed);
        assert!(report.errors[0].message.contains("more than"));
    }

    #[tokio::test]
    async fn test_passthrough_gateway_routes_onward() {
        let mut registry = StepRegistry::new();
        registry.register(Recorder("a"));
        registry.register(Recorder("b"));

        let spec = WorkflowSpec {
            steps: vec![
                StepDecl::task("a"),
                StepDecl::passthrough("join_gateway"),
                StepDecl::task("b"),
            ],
            ..WorkflowSpec::new("gated")
        }
        .with_transitions(vec![
            Transition::new("a", "join_gateway"),
            Transition::on_success("join_gateway", "b"),
        ]);
        let compiled = CompiledWorkflow::compile(spec, &registry, None).unwrap();

        let report = executor(registry).execute(&compiled, "req-1", empty(), empty()).await;
        assert!(report.succeeded());
        assert!(report.results["join_gateway"].succeeded());
        assert!(report.results.contains_key("b"));
    }

    #[tokio::test]
    async fn test_conditional_remediation_converges() {
        // Fails on the first visit, passes on the second: models a check that
        // succeeds after remediation.
        struct FlakyCheck;

        impl StepHandler for FlakyCheck {
            fn name(&self) -> &str {
                "check"
            }
            fn description(&self) -> &str {
                "fails once"
            }
            fn definition(&self) -> StepDefinition {
                def("check")
            }
            fn invoke<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepResult>> {
                Box::pin(async move {
                    if state.result("fix").is_some() {
                        Ok(StepResult::success())
                    } else {
                        Ok(StepResult::failed())
                    }
                })
            }
        }

        let mut registry = StepRegistry::new();
        registry.register(FlakyCheck);
        registry.register(Recorder("fix"));
        registry.register(Recorder("done"));

        let spec = WorkflowSpec::new("remediating")
            .with_steps(["check", "fix", "done"])
            .with_transitions(vec![
                Transition::on_failure("check", "fix"),
                Transition::on_success("check", "done"),
                Transition::new("fix", "check"),
            ]);
        let compiled = CompiledWorkflow::compile(spec, &registry, None).unwrap();

        let report = executor(registry).execute(&compiled, "req-1", empty(), empty()).await;
        assert!(report.succeeded());
        assert!(report.results.contains_key("done"));
    }

    #[tokio::test]
    async fn test_condition_reads_source_step_fields() {
        let mut registry = StepRegistry::new();
        registry.register(Recorder("sensor"));
        registry.register(Recorder("match"));
        registry.register(Recorder("fallback"));

        let spec = WorkflowSpec::new("fieldy")
            .with_steps(["sensor", "match", "fallback"])
            .with_transitions(vec![
                Transition {
                    from: "sensor".into(),
                    to: "match".into(),
                    condition: Some(Condition::Equals {
                        field: "ran".into(),
                        value: serde_json::json!("sensor"),
                    }),
                },
                Transition::new("sensor", "fallback"),
            ]);
        let compiled = CompiledWorkflow::compile(spec, &registry, None).unwrap();

        let report = executor(registry).execute(&compiled, "req-1", empty(), empty()).await;
        assert!(report.results.contains_key("match"));
        assert!(!report.results.contains_key("fallback"));
    }
}
