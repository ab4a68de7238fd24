use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a step is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Runs a registered handler.
    Task,
    /// Forwards the state unchanged (gateways, join points).
    Passthrough,
}

impl StepKind {
    /// Kind inferred from a bare step id, for specs that declare steps as
    /// plain strings. Ids containing "gateway" are passthrough.
    pub fn infer(id: &str) -> Self {
        if id.contains("gateway") {
            StepKind::Passthrough
        } else {
            StepKind::Task
        }
    }
}

/// A step declaration inside a workflow spec.
///
/// Serializes as a bare string when the kind matches what `StepKind::infer`
/// would produce for the id, and as `{id, kind}` otherwise. Both forms
/// deserialize, so generator output (plain string arrays) round-trips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDecl {
    pub id: String,
    pub kind: StepKind,
}

impl StepDecl {
    pub fn task(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::Task,
        }
    }

    pub fn passthrough(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::Passthrough,
        }
    }

    /// Declaration from a bare id, with the kind inferred.
    pub fn named(id: impl Into<String>) -> Self {
        let id = id.into();
        let kind = StepKind::infer(&id);
        Self { id, kind }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StepDeclRepr {
    Bare(String),
    Full { id: String, kind: StepKind },
}

impl Serialize for StepDecl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.kind == StepKind::infer(&self.id) {
            StepDeclRepr::Bare(self.id.clone()).serialize(serializer)
        } else {
            StepDeclRepr::Full {
                id: self.id.clone(),
                kind: self.kind,
            }
            .serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for StepDecl {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match StepDeclRepr::deserialize(deserializer)? {
            StepDeclRepr::Bare(id) => StepDecl::named(id),
            StepDeclRepr::Full { id, kind } => StepDecl { id, kind },
        })
    }
}

/// Predicate attached to a transition, evaluated against the source step's
/// recorded result. Unknown tags are rejected at deserialization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// A result field equals the given value. A missing field never matches.
    Equals {
        field: String,
        value: serde_json::Value,
    },
    /// A result field differs from the given value. A missing field matches.
    NotEquals {
        field: String,
        value: serde_json::Value,
    },
    /// The source step recorded a failed status.
    UpstreamFailed,
    /// The source step recorded a success status.
    UpstreamPassed,
}

impl Condition {
    /// Evaluate against the source step's recorded result, if any.
    pub fn matches(&self, result: Option<&crate::state::StepResult>) -> bool {
        use crate::state::StepStatus;
        match self {
            Condition::UpstreamFailed => {
                matches!(result.map(|r| r.status), Some(StepStatus::Failed))
            }
            Condition::UpstreamPassed => {
                matches!(result.map(|r| r.status), Some(StepStatus::Success))
            }
            // "status" is not stored in `fields`; resolve it explicitly so
            // conditions can match on it like any other field.
            Condition::Equals { field, value } if field == "status" => result
                .is_some_and(|r| value.as_str() == Some(r.status_str())),
            Condition::NotEquals { field, value } if field == "status" => {
                !result.is_some_and(|r| value.as_str() == Some(r.status_str()))
            }
            Condition::Equals { field, value } => result
                .and_then(|r| r.field(field))
                .is_some_and(|v| v == value),
            Condition::NotEquals { field, value } => {
                result.and_then(|r| r.field(field)) != Some(value)
            }
        }
    }
}

/// A directed, optionally conditional edge between two steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Transition {
    /// Create an unconditional transition.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
        }
    }

    /// Create a transition taken when the source step failed.
    pub fn on_failure(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: Some(Condition::UpstreamFailed),
        }
    }

    /// Create a transition taken when the source step succeeded.
    pub fn on_success(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: Some(Condition::UpstreamPassed),
        }
    }
}

/// Per-step configuration map.
pub type StepConfig = serde_json::Map<String, serde_json::Value>;

fn default_created_at() -> DateTime<Utc> {
    Utc::now()
}

/// A declarative workflow description.
///
/// Immutable once registered; the adjuster always produces a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StepDecl>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub step_configs: HashMap<String, StepConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
    #[serde(default = "default_created_at")]
    pub created_at: DateTime<Utc>,
}

impl WorkflowSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            transitions: Vec::new(),
            step_configs: HashMap::new(),
            acceptance_criteria: Vec::new(),
            generated_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_steps<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps = ids.into_iter().map(|id| StepDecl::named(id)).collect();
        self
    }

    pub fn with_transitions(mut self, transitions: Vec<Transition>) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn with_step_config(mut self, step: impl Into<String>, config: StepConfig) -> Self {
        self.step_configs.insert(step.into(), config);
        self
    }

    /// Whether a step id is declared.
    pub fn declares(&self, id: &str) -> bool {
        self.steps.iter().any(|s| s.id == id)
    }

    /// Steps with no outgoing transition.
    pub fn terminal_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| !self.transitions.iter().any(|t| t.from == s.id))
            .map(|s| s.id.as_str())
            .collect()
    }
}
