use std::collections::HashMap;

use tracing::debug;

use lakeflow_core::types::{StepConfig, StepDecl, Transition, WorkflowSpec};
use lakeflow_core::verdict::{Issue, RepairHints, Verdict};
use lakeflow_steps::StepRegistry;

/// Maximum parallelism any step config may request.
pub const MAX_PARALLELISM: u64 = 4;

/// Parallelism applied when a config exceeds the policy ceiling.
pub const CLAMPED_PARALLELISM: u64 = 2;

/// Deterministic workflow validator.
///
/// Derives checks from the requirement and each acceptance criterion: a known
/// step type named in any of them must be declared, "parallel" requires a
/// conditional fan-out, and failure/remediation wording requires a failure
/// edge. The parallelism policy ceiling is checked regardless of the texts.
pub struct RuleValidator {
    known_steps: Vec<String>,
}

impl RuleValidator {
    pub fn new(known_steps: Vec<String>) -> Self {
        Self { known_steps }
    }

    pub fn from_registry(registry: &StepRegistry) -> Self {
        Self::new(registry.names().into_iter().map(String::from).collect())
    }

    pub fn validate(&self, spec: &WorkflowSpec, requirement: &str, criteria: &[String]) -> Verdict {
        let mut texts: Vec<String> = Vec::with_capacity(criteria.len() + 1);
        texts.push(requirement.to_lowercase());
        texts.extend(criteria.iter().map(|c| c.to_lowercase()));
        let mentioned = |needle: &str| texts.iter().any(|t| t.contains(needle));

        let mut issues = Vec::new();
        let mut hints = RepairHints::default();

        for transition in &spec.transitions {
            for endpoint in [&transition.from, &transition.to] {
                if !spec.declares(endpoint) {
                    issues.push(Issue::for_step(
                        format!("transition references undeclared step '{endpoint}'"),
                        endpoint.clone(),
                    ));
                    hints.steps_to_add.push(StepDecl::named(endpoint.clone()));
                }
            }
        }

        for step in &self.known_steps {
            if mentioned(step.as_str()) && !spec.declares(step) {
                issues.push(Issue::for_step(
                    format!("step '{step}' is called for but the workflow does not declare it"),
                    step.clone(),
                ));
                hints.steps_to_add.push(StepDecl::named(step.clone()));
            }
        }

        if mentioned("parallel") && !has_conditional_fanout(spec) {
            issues.push(Issue::new(
                "parallel branches are called for but no step fans out conditionally",
            ));
        }

        if mentioned("failure") || mentioned("remediation") {
            let has_failure_edge = spec.transitions.iter().any(|t| {
                matches!(
                    t.condition,
                    Some(lakeflow_core::types::Condition::UpstreamFailed)
                )
            });
            if !has_failure_edge {
                issues.push(Issue::new(
                    "failure handling is called for but no transition fires on failure",
                ));
                if spec.declares("table_check") && spec.declares("analyze") {
                    hints
                        .transitions_to_add
                        .push(Transition::on_failure("table_check", "analyze"));
                }
            }
        }

        for (step, config) in &spec.step_configs {
            for (key, value) in config {
                if key.contains("parallel") {
                    if let Some(n) = value.as_u64() {
                        if n > MAX_PARALLELISM {
                            issues.push(Issue::for_step(
                                format!(
                                    "config '{key}' = {n} exceeds the platform ceiling of {MAX_PARALLELISM}"
                                ),
                                step.clone(),
                            ));
                            let mut update = StepConfig::new();
                            update.insert(key.clone(), serde_json::json!(CLAMPED_PARALLELISM));
                            merge_config_hint(&mut hints.step_config_updates, step, update);
                        }
                    }
                }
            }
        }

        debug!(workflow = %spec.name, issues = issues.len(), "rule validation complete");

        if issues.is_empty() {
            Verdict::valid("workflow satisfies all structural rules")
        } else {
            let feedback = issues
                .iter()
                .map(|i| i.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            Verdict::invalid(feedback, issues).with_hints(hints)
        }
    }
}

/// Whether some step routes to at least two targets, one conditionally. This
/// approximates a parallel fan-out in a sequential engine: the branches exist
/// even though they run one at a time.
fn has_conditional_fanout(spec: &WorkflowSpec) -> bool {
    let mut outgoing: HashMap<&str, (usize, bool)> = HashMap::new();
    for t in &spec.transitions {
        let entry = outgoing.entry(t.from.as_str()).or_insert((0, false));
        entry.0 += 1;
        entry.1 |= t.condition.is_some();
    }
    outgoing
        .values()
        .any(|(count, conditional)| *count >= 2 && *conditional)
}

fn merge_config_hint(
    updates: &mut HashMap<String, StepConfig>,
    step: &str,
    update: StepConfig,
) {
    let entry = updates.entry(step.to_string()).or_default();
    for (k, v) in update {
        entry.insert(k, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakeflow_core::verdict::VerdictStatus;
    use lakeflow_engine::presets::standard_lake_ingestion;

    fn validator() -> RuleValidator {
        RuleValidator::from_registry(&StepRegistry::with_builtins())
    }

    #[test]
    fn test_standard_workflow_passes_plain_requirement() {
        let verdict = validator().validate(
            &standard_lake_ingestion(),
            "Ingest the order_detail table into the lake",
            &[],
        );
        assert!(verdict.is_valid());
    }

    #[test]
    fn test_named_step_must_be_declared() {
        let spec = WorkflowSpec::new("wf").with_steps(["page_submit", "sql_generate"]);
        let verdict = validator().validate(&spec, "Run a table_check before generating SQL", &[]);

        assert_eq!(verdict.status, VerdictStatus::Invalid);
        assert!(verdict.issues.iter().any(|i| i.step.as_deref() == Some("table_check")));
        assert!(verdict
            .repair_hints
            .steps_to_add
            .iter()
            .any(|s| s.id == "table_check"));
    }

    #[test]
    fn test_acceptance_criterion_alone_flips_verdict() {
        let spec = WorkflowSpec::new("wf").with_steps(["page_submit", "sql_generate"]);

        // Plain requirement passes, the criterion naming analyze does not
        let verdict = validator().validate(&spec, "Ingest the order table", &[]);
        assert!(verdict.is_valid());

        let criteria = vec!["run analyze on every blocked table".to_string()];
        let verdict = validator().validate(&spec, "Ingest the order table", &criteria);
        assert_eq!(verdict.status, VerdictStatus::Invalid);
        assert!(verdict
            .repair_hints
            .steps_to_add
            .iter()
            .any(|s| s.id == "analyze"));
    }

    #[test]
    fn test_parallel_requirement_needs_fanout() {
        let spec = WorkflowSpec::new("wf")
            .with_steps(["page_submit", "sql_generate"])
            .with_transitions(vec![Transition::new("page_submit", "sql_generate")]);
        let verdict = validator().validate(&spec, "Sync with parallel branches", &[]);
        assert_eq!(verdict.status, VerdictStatus::Invalid);

        // The standard workflow fans out after table_check, so it passes
        let verdict = validator().validate(
            &standard_lake_ingestion(),
            "Sync with parallel branches",
            &[],
        );
        assert!(verdict.is_valid());
    }

    #[test]
    fn test_failure_requirement_hints_remediation_edge() {
        let spec = WorkflowSpec::new("wf")
            .with_steps(["table_check", "analyze"])
            .with_transitions(vec![Transition::new("table_check", "analyze")]);
        let verdict = validator().validate(&spec, "Handle failure with remediation", &[]);

        assert_eq!(verdict.status, VerdictStatus::Invalid);
        let hint = &verdict.repair_hints.transitions_to_add[0];
        assert_eq!(hint.from, "table_check");
        assert_eq!(hint.to, "analyze");
    }

    #[test]
    fn test_parallelism_ceiling_enforced() {
        let mut config = StepConfig::new();
        config.insert("parallelism".into(), serde_json::json!(8));
        let spec = WorkflowSpec::new("wf")
            .with_steps(["integration_task_generate"])
            .with_step_config("integration_task_generate", config);

        let verdict = validator().validate(&spec, "anything", &[]);
        assert_eq!(verdict.status, VerdictStatus::Invalid);
        let update = &verdict.repair_hints.step_config_updates["integration_task_generate"];
        assert_eq!(update["parallelism"], serde_json::json!(CLAMPED_PARALLELISM));
    }

    #[test]
    fn test_dangling_transition_reported() {
        let spec = WorkflowSpec::new("wf")
            .with_steps(["page_submit"])
            .with_transitions(vec![Transition::new("page_submit", "ghost")]);
        let verdict = validator().validate(&spec, "anything", &[]);
        assert_eq!(verdict.status, VerdictStatus::Invalid);
        assert!(verdict.issues[0].message.contains("ghost"));
    }
}
