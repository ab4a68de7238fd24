use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{StepConfig, StepDecl, Transition, WorkflowSpec};

/// Outcome of validating a workflow spec.
///
/// `Error` means the validation dialogue failed to converge — it is not a
/// judgement about the workflow itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Valid,
    Invalid,
    Error,
}

/// One problem found during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

impl Issue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            step: None,
        }
    }

    pub fn for_step(message: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            step: Some(step.into()),
        }
    }
}

/// A structured diff the adjuster applies verbatim to a failing spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairHints {
    #[serde(default)]
    pub steps_to_add: Vec<StepDecl>,
    #[serde(default)]
    pub transitions_to_add: Vec<Transition>,
    #[serde(default)]
    pub step_config_updates: HashMap<String, StepConfig>,
}

impl RepairHints {
    pub fn is_empty(&self) -> bool {
        self.steps_to_add.is_empty()
            && self.transitions_to_add.is_empty()
            && self.step_config_updates.is_empty()
    }
}

/// The structured result of one validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub repair_hints: RepairHints,
}

impl Verdict {
    pub fn valid(feedback: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Valid,
            feedback: feedback.into(),
            issues: Vec::new(),
            repair_hints: RepairHints::default(),
        }
    }

    pub fn invalid(feedback: impl Into<String>, issues: Vec<Issue>) -> Self {
        Self {
            status: VerdictStatus::Invalid,
            feedback: feedback.into(),
            issues,
            repair_hints: RepairHints::default(),
        }
    }

    pub fn error(feedback: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Error,
            feedback: feedback.into(),
            issues: Vec::new(),
            repair_hints: RepairHints::default(),
        }
    }

    pub fn with_hints(mut self, hints: RepairHints) -> Self {
        self.repair_hints = hints;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.status == VerdictStatus::Valid
    }
}

/// One generate → validate round of the synthesis loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub round: usize,
    pub spec: WorkflowSpec,
    pub verdict: Verdict,
    pub feedback: String,
}

/// What a synthesis run returns. Never an error: `accepted = false` with the
/// last attempted spec is the soft-failure shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    pub request_id: String,
    pub final_spec: WorkflowSpec,
    pub iterations: Vec<IterationRecord>,
    pub accepted: bool,
}
