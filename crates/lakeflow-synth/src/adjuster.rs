use tracing::debug;

use lakeflow_core::types::{StepDecl, Transition, WorkflowSpec};
use lakeflow_core::verdict::Verdict;

use crate::rules::{CLAMPED_PARALLELISM, MAX_PARALLELISM};

/// Applies a verdict's findings to a failing spec, producing a new spec.
///
/// Structured repair hints are applied verbatim. Without hints, the adjuster
/// falls back to substring heuristics over the issue messages. Either way the
/// parallelism ceiling is enforced on every config before returning.
pub struct WorkflowAdjuster;

impl WorkflowAdjuster {
    pub fn adjust(&self, spec: &WorkflowSpec, verdict: &Verdict) -> WorkflowSpec {
        let mut adjusted = spec.clone();

        if !verdict.repair_hints.is_empty() {
            apply_hints(&mut adjusted, verdict);
        } else {
            apply_heuristics(&mut adjusted, verdict);
        }

        clamp_parallelism(&mut adjusted);
        adjusted
    }
}

fn apply_hints(spec: &mut WorkflowSpec, verdict: &Verdict) {
    let hints = &verdict.repair_hints;

    for step in &hints.steps_to_add {
        if !spec.declares(&step.id) {
            debug!(step = %step.id, "adding step from repair hint");
            spec.steps.push(step.clone());
        }
    }

    for transition in &hints.transitions_to_add {
        let exists = spec
            .transitions
            .iter()
            .any(|t| t.from == transition.from && t.to == transition.to);
        if !exists {
            debug!(from = %transition.from, to = %transition.to, "adding transition from repair hint");
            spec.transitions.push(transition.clone());
        }
    }

    for (step, update) in &hints.step_config_updates {
        let config = spec.step_configs.entry(step.clone()).or_default();
        for (key, value) in update {
            config.insert(key.clone(), value.clone());
        }
    }
}

fn apply_heuristics(spec: &mut WorkflowSpec, verdict: &Verdict) {
    for issue in &verdict.issues {
        // "... step 'name' ..." mentions are treated as missing steps
        if issue.message.contains("step") {
            if let Some(name) = quoted_name(&issue.message) {
                if !spec.declares(&name) {
                    debug!(step = %name, "adding step from issue text");
                    spec.steps.push(StepDecl::named(name));
                }
            }
        }

        // A parallelism complaint forces the conservative setting even when
        // the offending value is under the hard ceiling
        if issue.message.contains("parallel") {
            force_parallelism(spec);
        }

        if issue.message.contains("failure") || issue.message.contains("remediation") {
            let has_failure_edge = spec.transitions.iter().any(|t| {
                matches!(
                    t.condition,
                    Some(lakeflow_core::types::Condition::UpstreamFailed)
                )
            });
            if !has_failure_edge && spec.declares("table_check") && spec.declares("analyze") {
                debug!("adding remediation edge from issue text");
                spec.transitions
                    .push(Transition::on_failure("table_check", "analyze"));
            }
        }
    }
}

fn force_parallelism(spec: &mut WorkflowSpec) {
    for config in spec.step_configs.values_mut() {
        for (key, value) in config.iter_mut() {
            if key.contains("parallel")
                && matches!(value.as_u64(), Some(n) if n != CLAMPED_PARALLELISM)
            {
                debug!(key = %key, "forcing parallelism down after complaint");
                *value = serde_json::json!(CLAMPED_PARALLELISM);
            }
        }
    }
}

/// First 'single-quoted' name in a message.
fn quoted_name(message: &str) -> Option<String> {
    let start = message.find('\'')?;
    let rest = &message[start + 1..];
    let end = rest.find('\'')?;
    let name = &rest[..end];
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Force every parallelism-shaped config value under the platform ceiling.
/// Applied unconditionally: a spec leaving the adjuster never requests more
/// than the platform allows, whatever the verdict said.
fn clamp_parallelism(spec: &mut WorkflowSpec) {
    for config in spec.step_configs.values_mut() {
        for (key, value) in config.iter_mut() {
            if key.contains("parallel") {
                if let Some(n) = value.as_u64() {
                    if n > MAX_PARALLELISM {
                        debug!(key = %key, from = n, to = CLAMPED_PARALLELISM, "clamping parallelism");
                        *value = serde_json::json!(CLAMPED_PARALLELISM);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakeflow_core::types::StepConfig;
    use lakeflow_core::verdict::{Issue, RepairHints, Verdict};

    #[test]
    fn test_hints_applied_verbatim() {
        let spec = WorkflowSpec::new("wf").with_steps(["page_submit"]);
        let hints = RepairHints {
            steps_to_add: vec![StepDecl::task("table_check")],
            transitions_to_add: vec![Transition::new("page_submit", "table_check")],
            ..Default::default()
        };
        let verdict = Verdict::invalid("missing check", vec![]).with_hints(hints);

        let adjusted = WorkflowAdjuster.adjust(&spec, &verdict);
        assert!(adjusted.declares("table_check"));
        assert_eq!(adjusted.transitions.len(), 1);
        // Original untouched
        assert!(!spec.declares("table_check"));
    }

    #[test]
    fn test_hints_do_not_duplicate() {
        let spec = WorkflowSpec::new("wf")
            .with_steps(["page_submit", "table_check"])
            .with_transitions(vec![Transition::new("page_submit", "table_check")]);
        let hints = RepairHints {
            steps_to_add: vec![StepDecl::task("table_check")],
            transitions_to_add: vec![Transition::new("page_submit", "table_check")],
            ..Default::default()
        };
        let verdict = Verdict::invalid("dup", vec![]).with_hints(hints);

        let adjusted = WorkflowAdjuster.adjust(&spec, &verdict);
        assert_eq!(adjusted.steps.len(), 2);
        assert_eq!(adjusted.transitions.len(), 1);
    }

    #[test]
    fn test_heuristic_adds_quoted_step() {
        let spec = WorkflowSpec::new("wf").with_steps(["page_submit"]);
        let verdict = Verdict::invalid(
            "bad",
            vec![Issue::new("requirement names step 'analyze' but it is missing")],
        );

        let adjusted = WorkflowAdjuster.adjust(&spec, &verdict);
        assert!(adjusted.declares("analyze"));
    }

    #[test]
    fn test_heuristic_adds_remediation_edge() {
        let spec = WorkflowSpec::new("wf").with_steps(["table_check", "analyze"]);
        let verdict = Verdict::invalid(
            "bad",
            vec![Issue::new("no transition fires on failure")],
        );

        let adjusted = WorkflowAdjuster.adjust(&spec, &verdict);
        assert_eq!(adjusted.transitions.len(), 1);
        assert_eq!(adjusted.transitions[0].to, "analyze");
    }

    #[test]
    fn test_parallel_complaint_forces_conservative_setting() {
        // 3 is under the hard ceiling, so the unconditional clamp alone
        // would leave it alone; the complaint heuristic must not.
        let mut config = StepConfig::new();
        config.insert("parallelism".into(), serde_json::json!(3));
        let spec = WorkflowSpec::new("wf")
            .with_steps(["integration_task_generate"])
            .with_step_config("integration_task_generate", config);
        let verdict = Verdict::invalid(
            "bad",
            vec![Issue::new("parallelism too aggressive for this source")],
        );

        let adjusted = WorkflowAdjuster.adjust(&spec, &verdict);
        let config = &adjusted.step_configs["integration_task_generate"];
        assert_eq!(config["parallelism"], serde_json::json!(CLAMPED_PARALLELISM));
    }

    #[test]
    fn test_parallelism_clamped_even_without_issues() {
        let mut config = StepConfig::new();
        config.insert("parallelism".into(), serde_json::json!(16));
        config.insert("task_parallelism".into(), serde_json::json!(3));
        let spec = WorkflowSpec::new("wf")
            .with_steps(["integration_task_generate"])
            .with_step_config("integration_task_generate", config);

        // A valid verdict still goes through the clamp
        let adjusted = WorkflowAdjuster.adjust(&spec, &Verdict::valid("fine"));
        let config = &adjusted.step_configs["integration_task_generate"];
        assert_eq!(config["parallelism"], serde_json::json!(CLAMPED_PARALLELISM));
        // Values already under the ceiling are untouched
        assert_eq!(config["task_parallelism"], serde_json::json!(3));
    }
}
