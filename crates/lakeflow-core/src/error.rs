use thiserror::Error;

#[derive(Debug, Error)]
pub enum LakeflowError {
    // Compile errors — fatal to registration
    #[error("Workflow has no steps")]
    EmptyWorkflow,

    #[error("Transition references undeclared step: {0}")]
    DanglingReference(String),

    #[error("Unknown step type for step '{step}': no handler registered")]
    UnknownStepType { step: String },

    // Store errors
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    // Execution errors — fatal to the current execution only
    #[error("Step '{step}' failed: {message}")]
    StepExecution { step: String, message: String },

    #[error("Step '{step}' visited more than {limit} times, aborting execution")]
    StepLoopExceeded { step: String, limit: usize },

    // Validation dialogue errors
    #[error("Validation dialogue exceeded {0} rounds without a verdict")]
    DialogueExceeded(usize),

    // Tool errors — recovered inside the validator dialogue
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    // Generative-text service errors — recovered by default fallbacks
    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Generated text could not be parsed: {0}")]
    GenerationParse(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LakeflowError>;
