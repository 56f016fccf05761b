//! Engine error taxonomy
//!
//! Errors are split into two layers: `BackendError` covers transport and
//! provider failures raised while talking to an inference backend (defined in
//! `backend`), while `EngineError` is the engine-level taxonomy surfaced to
//! callers of the orchestrator, router, and stores.

use crate::workflow::types::Stage;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine-level errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No backend in the catalog satisfies a stage's requirement set.
    /// Fatal to the task run; the unmet requirement is named in the message.
    #[error("model selection failed: {0}")]
    ModelSelection(String),

    /// A stage's backend invocation failed or returned unusable output.
    /// Fatal to the task run; the failing stage is recorded.
    #[error("{stage} stage failed: {cause}")]
    AgentExecution { stage: Stage, cause: String },

    /// An invariant of the workflow state machine was violated.
    /// Always logged, never silently swallowed.
    #[error("workflow error: {0}")]
    Workflow(String),

    /// Malformed input rejected at the boundary before touching any store.
    #[error("validation error: {0}")]
    Validation(String),

    /// A durable store could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// The stage this error is attributed to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EngineError::AgentExecution { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
