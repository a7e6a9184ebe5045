pub mod orchestrator;
pub mod postprocess;
pub mod prompt;
pub mod types;

pub use orchestrator::{OrchestratorSettings, TaskOrchestrator, DEFAULT_CONTEXT_MESSAGES, DEFAULT_GRACE};
pub use types::{
    ContentKind, FailureReason, GenerationRequest, ModuleKind, Progress, TaskError, TaskSnapshot, TaskStatus,
    MAX_UNITS, MIN_UNITS,
};
