pub mod adjuster;
pub mod catalog;
pub mod dialogue;
pub mod generator;
pub mod rules;
pub mod synthesis;
pub mod tools;

pub use adjuster::WorkflowAdjuster;
pub use catalog::MockCatalog;
pub use dialogue::DialogueValidator;
pub use generator::WorkflowGenerator;
pub use rules::RuleValidator;
pub use synthesis::{SynthesisLoop, Validator};
pub use tools::ToolCatalog;
