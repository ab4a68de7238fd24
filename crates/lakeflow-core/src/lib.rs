pub mod config;
pub mod error;
pub mod state;
pub mod traits;
pub mod types;
pub mod verdict;

pub use config::AppConfig;
pub use error::{LakeflowError, Result};
pub use state::{ExecutionError, ExecutionReport, ExecutionStatus, RunState, StepResult, StepStatus};
pub use types::{Condition, StepConfig, StepDecl, StepKind, Transition, WorkflowSpec};
pub use verdict::{Issue, IterationRecord, RepairHints, SynthesisOutcome, Verdict, VerdictStatus};
