//! Workflow System
//!
//! Sequences the four fixed processing stages over a task, wiring router
//! decisions and memory context into each stage invocation.

pub mod orchestrator;
pub mod stages;
pub mod types;

pub use orchestrator::Orchestrator;
pub use stages::StageExecutor;
pub use types::{RunState, Stage, StageFailure, Task, WorkflowState};
