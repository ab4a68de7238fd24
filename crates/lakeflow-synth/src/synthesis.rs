use futures::future::BoxFuture;
use tracing::{info, warn};
use uuid::Uuid;

use lakeflow_core::traits::{StepDefinition, TextGenerator};
use lakeflow_core::types::WorkflowSpec;
use lakeflow_core::verdict::{IterationRecord, SynthesisOutcome, Verdict, VerdictStatus};

use crate::adjuster::WorkflowAdjuster;
use crate::generator::WorkflowGenerator;

/// A strategy for judging a drafted workflow.
pub trait Validator: Send + Sync {
    fn validate<'a>(
        &'a self,
        spec: &'a WorkflowSpec,
        requirement: &'a str,
        criteria: &'a [String],
    ) -> BoxFuture<'a, Verdict>;
}

impl Validator for crate::rules::RuleValidator {
    fn validate<'a>(
        &'a self,
        spec: &'a WorkflowSpec,
        requirement: &'a str,
        criteria: &'a [String],
    ) -> BoxFuture<'a, Verdict> {
        Box::pin(async move { self.validate(spec, requirement, criteria) })
    }
}

impl<G: TextGenerator> Validator for crate::dialogue::DialogueValidator<G> {
    fn validate<'a>(
        &'a self,
        spec: &'a WorkflowSpec,
        requirement: &'a str,
        criteria: &'a [String],
    ) -> BoxFuture<'a, Verdict> {
        Box::pin(self.validate(spec, requirement, criteria))
    }
}

/// Generate → validate → adjust loop.
///
/// Runs until a draft is accepted or the round budget is spent. Never errors:
/// an exhausted budget yields `accepted = false` with the last attempted spec,
/// so callers always get something inspectable. An `Error` verdict fails only
/// that round; its feedback seeds the next draft like any other rejection.
pub struct SynthesisLoop<G> {
    generator: WorkflowGenerator<G>,
    validator: Box<dyn Validator>,
    adjuster: WorkflowAdjuster,
    definitions: Vec<StepDefinition>,
    max_rounds: usize,
}

impl<G: TextGenerator> SynthesisLoop<G> {
    pub fn new(
        generator: G,
        validator: Box<dyn Validator>,
        definitions: Vec<StepDefinition>,
        max_rounds: usize,
    ) -> Self {
        Self {
            generator: WorkflowGenerator::new(generator),
            validator,
            adjuster: WorkflowAdjuster,
            definitions,
            max_rounds,
        }
    }

    pub async fn run(&self, requirement: &str, criteria: &[String]) -> SynthesisOutcome {
        let request_id = Uuid::new_v4().simple().to_string();
        let mut iterations: Vec<IterationRecord> = Vec::new();

        info!(request_id = %request_id, phase = "generating", "synthesis started");
        let mut spec = self
            .generator
            .generate(requirement, criteria, &self.definitions)
            .await;

        for round in 1..=self.max_rounds {
            info!(round, workflow = %spec.name, phase = "validating", "validating draft");
            let verdict = self.validator.validate(&spec, requirement, criteria).await;

            iterations.push(IterationRecord {
                round,
                spec: spec.clone(),
                verdict: verdict.clone(),
                feedback: verdict.feedback.clone(),
            });

            match verdict.status {
                VerdictStatus::Valid => {
                    info!(round, workflow = %spec.name, phase = "accepted", "draft accepted");
                    return SynthesisOutcome {
                        request_id,
                        final_spec: spec,
                        iterations,
                        accepted: true,
                    };
                }
                // An errored validation attempt costs its round but does not
                // end the loop; the next round works from its feedback.
                VerdictStatus::Invalid | VerdictStatus::Error => {
                    if verdict.status == VerdictStatus::Error {
                        warn!(round, feedback = %verdict.feedback, "validation errored this round");
                    } else {
                        info!(round, phase = "adjusting", feedback = %verdict.feedback, "adjusting draft");
                    }
                    let adjusted = self.adjuster.adjust(&spec, &verdict);

                    // When neither hints nor heuristics changed anything, ask
                    // the model for a fresh draft instead of re-validating the
                    // same spec.
                    let unchanged = serde_json::to_value(&adjusted).ok()
                        == serde_json::to_value(&spec).ok();
                    spec = if unchanged {
                        self.generator
                            .revise(requirement, criteria, &spec, &verdict.feedback, &self.definitions)
                            .await
                    } else {
                        adjusted
                    };
                }
            }
        }

        warn!(request_id = %request_id, rounds = iterations.len(), "synthesis did not converge");
        SynthesisOutcome {
            request_id,
            final_spec: spec,
            iterations,
            accepted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture as BF;
    use lakeflow_core::error::Result;
    use lakeflow_core::types::StepConfig;
    use lakeflow_core::verdict::{Issue, RepairHints};
    use lakeflow_steps::StepRegistry;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::rules::RuleValidator;

    struct Canned(&'static str);

    impl TextGenerator for Canned {
        fn generate<'a>(&'a self, _prompt: &'a str) -> BF<'a, Result<String>> {
            Box::pin(async move { Ok(self.0.to_string()) })
        }
    }

    struct ScriptedValidator(Mutex<VecDeque<Verdict>>);

    impl ScriptedValidator {
        fn new(verdicts: Vec<Verdict>) -> Self {
            Self(Mutex::new(verdicts.into()))
        }
    }

    impl Validator for ScriptedValidator {
        fn validate<'a>(
            &'a self,
            _spec: &'a WorkflowSpec,
            _requirement: &'a str,
            _criteria: &'a [String],
        ) -> BF<'a, Verdict> {
            Box::pin(async move {
                self.0
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Verdict::invalid("still wrong", vec![]))
            })
        }
    }

    fn definitions() -> Vec<StepDefinition> {
        StepRegistry::with_builtins().definitions()
    }

    const DRAFT_MISSING_ANALYZE: &str = r#"```json
{
  "name": "draft",
  "steps": ["page_submit", "table_check"],
  "transitions": [{"from": "page_submit", "to": "table_check"}]
}
```"#;

    #[tokio::test]
    async fn test_invalid_then_repaired_then_accepted() {
        // Rule validator flags the missing analyze step on round one and its
        // repair hint fixes the draft for round two.
        let validator = RuleValidator::from_registry(&StepRegistry::with_builtins());
        let synth = SynthesisLoop::new(
            Canned(DRAFT_MISSING_ANALYZE),
            Box::new(validator),
            definitions(),
            5,
        );

        let outcome = synth.run("check the table then analyze any issues", &[]).await;
        assert!(outcome.accepted);
        assert_eq!(outcome.iterations.len(), 2);
        assert_eq!(outcome.iterations[0].verdict.status, VerdictStatus::Invalid);
        assert!(outcome.final_spec.declares("analyze"));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_last_spec() {
        let verdicts = vec![
            Verdict::invalid("wrong", vec![]),
            Verdict::invalid("still wrong", vec![]),
            Verdict::invalid("nope", vec![]),
        ];
        let synth = SynthesisLoop::new(
            Canned(DRAFT_MISSING_ANALYZE),
            Box::new(ScriptedValidator::new(verdicts)),
            definitions(),
            3,
        );

        let outcome = synth.run("ingest orders", &[]).await;
        assert!(!outcome.accepted);
        assert_eq!(outcome.iterations.len(), 3);
        assert_eq!(outcome.final_spec.name, "draft");
    }

    #[tokio::test]
    async fn test_error_verdict_consumes_one_round_only() {
        // An errored validation attempt must not end the loop: the next
        // round revalidates and may still accept.
        let verdicts = vec![Verdict::error("dialogue did not converge"), Verdict::valid("fine")];
        let synth = SynthesisLoop::new(
            Canned(DRAFT_MISSING_ANALYZE),
            Box::new(ScriptedValidator::new(verdicts)),
            definitions(),
            3,
        );

        let outcome = synth.run("ingest orders", &[]).await;
        assert!(outcome.accepted);
        assert_eq!(outcome.iterations.len(), 2);
        assert_eq!(outcome.iterations[0].verdict.status, VerdictStatus::Error);
        assert_eq!(outcome.iterations[1].verdict.status, VerdictStatus::Valid);
    }

    #[tokio::test]
    async fn test_all_rounds_erroring_exhausts_budget() {
        let verdicts = vec![
            Verdict::error("offline"),
            Verdict::error("offline"),
            Verdict::error("offline"),
        ];
        let synth = SynthesisLoop::new(
            Canned(DRAFT_MISSING_ANALYZE),
            Box::new(ScriptedValidator::new(verdicts)),
            definitions(),
            3,
        );

        let outcome = synth.run("ingest orders", &[]).await;
        assert!(!outcome.accepted);
        assert_eq!(outcome.iterations.len(), 3);
    }

    #[tokio::test]
    async fn test_parallelism_clamped_through_repair() {
        const GREEDY_DRAFT: &str = r#"```json
{
  "name": "greedy",
  "steps": ["page_submit", "integration_task_generate"],
  "transitions": [{"from": "page_submit", "to": "integration_task_generate"}],
  "step_configs": {"integration_task_generate": {"parallelism": 8}}
}
```"#;
        let validator = RuleValidator::from_registry(&StepRegistry::with_builtins());
        let synth = SynthesisLoop::new(Canned(GREEDY_DRAFT), Box::new(validator), definitions(), 5);

        let outcome = synth.run("sync the table", &[]).await;
        assert!(outcome.accepted);
        let config = &outcome.final_spec.step_configs["integration_task_generate"];
        assert_eq!(config["parallelism"], serde_json::json!(2));
    }

    #[tokio::test]
    async fn test_structured_hints_applied_between_rounds() {
        let hints = RepairHints {
            step_config_updates: [(
                "integration_task_generate".to_string(),
                [("parallelism".to_string(), serde_json::json!(3))]
                    .into_iter()
                    .collect::<StepConfig>(),
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let verdicts = vec![
            Verdict::invalid("tune it down", vec![Issue::new("too parallel")]).with_hints(hints),
            Verdict::valid("fine now"),
        ];

        const DRAFT: &str = r#"```json
{
  "name": "draft",
  "steps": ["page_submit", "integration_task_generate"],
  "transitions": [{"from": "page_submit", "to": "integration_task_generate"}]
}
```"#;
        let synth = SynthesisLoop::new(
            Canned(DRAFT),
            Box::new(ScriptedValidator::new(verdicts)),
            definitions(),
            5,
        );

        let outcome = synth.run("sync the table", &[]).await;
        assert!(outcome.accepted);
        let config = &outcome.final_spec.step_configs["integration_task_generate"];
        assert_eq!(config["parallelism"], serde_json::json!(3));
    }
}
