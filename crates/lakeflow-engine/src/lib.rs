pub mod compiler;
pub mod executor;
pub mod presets;
pub mod store;

pub use compiler::CompiledWorkflow;
pub use executor::WorkflowExecutor;
pub use store::{WorkflowStore, WorkflowSummary};
