use std::collections::HashMap;

use lakeflow_core::error::{LakeflowError, Result};
use lakeflow_core::state::StepResult;
use lakeflow_core::types::{StepKind, Transition, WorkflowSpec};
use lakeflow_steps::StepRegistry;

/// A workflow spec checked against the registry and indexed for execution.
///
/// Compilation rejects empty specs, transitions naming undeclared steps, and
/// task steps with no registered handler. Passthrough steps compile whether or
/// not a handler exists; they run as no-ops.
///
/// Compilation is pure, so a compiled workflow can be cached and reused for
/// any number of executions.
#[derive(Clone, Debug)]
pub struct CompiledWorkflow {
    pub spec: WorkflowSpec,
    pub entry: String,
    kinds: HashMap<String, StepKind>,
    /// Outgoing transitions per source step, in declaration order.
    routes: HashMap<String, Vec<Transition>>,
}

impl CompiledWorkflow {
    /// Compile a spec. The entry step defaults to the first declared step.
    pub fn compile(
        spec: WorkflowSpec,
        registry: &StepRegistry,
        entry_override: Option<&str>,
    ) -> Result<Self> {
        if spec.steps.is_empty() {
            return Err(LakeflowError::EmptyWorkflow);
        }

        let entry = match entry_override {
            Some(id) => {
                if !spec.declares(id) {
                    return Err(LakeflowError::DanglingReference(id.to_string()));
                }
                id.to_string()
            }
            None => spec.steps[0].id.clone(),
        };

        for transition in &spec.transitions {
            if !spec.declares(&transition.from) {
                return Err(LakeflowError::DanglingReference(transition.from.clone()));
            }
            if !spec.declares(&transition.to) {
                return Err(LakeflowError::DanglingReference(transition.to.clone()));
            }
        }

        let mut kinds = HashMap::new();
        for step in &spec.steps {
            if step.kind == StepKind::Task && !registry.contains(&step.id) {
                return Err(LakeflowError::UnknownStepType {
                    step: step.id.clone(),
                });
            }
            kinds.insert(step.id.clone(), step.kind);
        }

        let mut routes: HashMap<String, Vec<Transition>> = HashMap::new();
        for transition in &spec.transitions {
            routes
                .entry(transition.from.clone())
                .or_default()
                .push(transition.clone());
        }

        Ok(Self {
            spec,
            entry,
            kinds,
            routes,
        })
    }

    pub fn kind(&self, step: &str) -> Option<StepKind> {
        self.kinds.get(step).copied()
    }

    /// Route from a step given its just-recorded result.
    ///
    /// Outgoing transitions are tried in declaration order; the first whose
    /// condition matches wins, and an unconditional transition always matches.
    /// `None` means the step is terminal for this run.
    pub fn next(&self, from: &str, result: Option<&StepResult>) -> Option<&str> {
        let outgoing = self.routes.get(from)?;
        outgoing
            .iter()
            .find(|t| t.condition.as_ref().map_or(true, |c| c.matches(result)))
            .map(|t| t.to.as_str())
    }

    /// Whether a step has any outgoing transition.
    pub fn has_outgoing(&self, step: &str) -> bool {
        self.routes.contains_key(step)
    }
}
