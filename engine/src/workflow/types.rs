//! Workflow types
//!
//! The workflow is an explicit finite-state machine: a run enters at
//! `Planning`, advances through the fixed stage order, and terminates at
//! `Done` or `Error`. The transition function is total — advancing from a
//! terminal state is a workflow error, never a silent no-op.

use crate::backend::router::SelectionDecision;
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A task submitted for orchestration. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id
    pub id: String,

    /// The task text — the only input the router and stages examine
    pub text: String,

    /// Intake timestamp
    pub submitted_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task with a generated id
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// One of the four fixed processing stages, applied in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Planning,
    Researching,
    Executing,
    Critiquing,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 4] = [
        Stage::Planning,
        Stage::Researching,
        Stage::Executing,
        Stage::Critiquing,
    ];

    /// The stage following this one, or `None` after the final stage
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Planning => Some(Stage::Researching),
            Stage::Researching => Some(Stage::Executing),
            Stage::Executing => Some(Stage::Critiquing),
            Stage::Critiquing => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Researching => "researching",
            Stage::Executing => "executing",
            Stage::Critiquing => "critiquing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position of a run in the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Currently executing the given stage
    Stage(Stage),
    /// All stages completed
    Done,
    /// A stage failed; the run is aborted
    Error,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Stage(stage) => stage.as_str(),
            RunState::Done => "done",
            RunState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Error)
    }
}

/// The stage and cause recorded when a run aborts
#[derive(Debug, Clone, Serialize)]
pub struct StageFailure {
    /// The stage that failed
    pub stage: Stage,

    /// Human-readable cause
    pub message: String,
}

/// Mutable per-run record, owned exclusively by the orchestrator instance
/// processing the task and discarded after the result is returned.
#[derive(Debug)]
pub struct WorkflowState {
    /// The task being processed
    pub task: Task,

    /// Current position in the state machine
    pub state: RunState,

    /// Output of the planning stage
    pub plan: Option<String>,

    /// Output of the research stage
    pub research: Option<String>,

    /// Output of the execution stage
    pub execution_result: Option<String>,

    /// Output of the critique stage
    pub review: Option<String>,

    /// Stages completed so far, in order
    pub completed: Vec<Stage>,

    /// Per-stage routing decisions, kept for observability only
    pub decisions: Vec<SelectionDecision>,

    /// Failure details when the run aborted
    pub failure: Option<StageFailure>,
}

impl WorkflowState {
    /// Create the state for a fresh run, entering at the planning stage
    pub fn new(task: Task) -> Self {
        Self {
            task,
            state: RunState::Stage(Stage::Planning),
            plan: None,
            research: None,
            execution_result: None,
            review: None,
            completed: Vec::with_capacity(Stage::ALL.len()),
            decisions: Vec::with_capacity(Stage::ALL.len()),
            failure: None,
        }
    }

    /// Merge a stage's output into the accumulated state
    pub fn merge(&mut self, stage: Stage, output: String) {
        match stage {
            Stage::Planning => self.plan = Some(output),
            Stage::Researching => self.research = Some(output),
            Stage::Executing => self.execution_result = Some(output),
            Stage::Critiquing => self.review = Some(output),
        }
    }

    /// Advance to the next state in the fixed order.
    ///
    /// Returns a workflow error if called on a terminal state — the state
    /// machine never rewinds and never re-enters a stage.
    pub fn advance(&mut self) -> Result<(), EngineError> {
        match self.state {
            RunState::Stage(stage) => {
                self.completed.push(stage);
                self.state = stage.next().map(RunState::Stage).unwrap_or(RunState::Done);
                Ok(())
            }
            RunState::Done | RunState::Error => Err(EngineError::Workflow(format!(
                "attempted transition from terminal state {}",
                self.state.as_str()
            ))),
        }
    }

    /// Abort the run, recording which stage failed and why
    pub fn fail(&mut self, stage: Stage, message: impl Into<String>) {
        self.state = RunState::Error;
        self.failure = Some(StageFailure {
            stage,
            message: message.into(),
        });
    }

    /// Record a routing decision for observability
    pub fn record_decision(&mut self, decision: SelectionDecision) {
        self.decisions.push(decision);
    }

    /// The final result of a completed run: the execution output, falling
    /// back to the review when execution produced nothing.
    pub fn final_result(&self) -> Option<&str> {
        self.execution_result.as_deref().or(self.review.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::Planning.next(), Some(Stage::Researching));
        assert_eq!(Stage::Researching.next(), Some(Stage::Executing));
        assert_eq!(Stage::Executing.next(), Some(Stage::Critiquing));
        assert_eq!(Stage::Critiquing.next(), None);
    }

    #[test]
    fn test_advance_walks_all_stages_in_order() {
        let mut state = WorkflowState::new(Task::new("do the thing"));

        for expected in Stage::ALL {
            assert_eq!(state.state, RunState::Stage(expected));
            state.advance().unwrap();
        }

        assert_eq!(state.state, RunState::Done);
        assert_eq!(state.completed, Stage::ALL.to_vec());
    }

    #[test]
    fn test_advance_from_terminal_is_workflow_error() {
        let mut state = WorkflowState::new(Task::new("do the thing"));
        for _ in Stage::ALL {
            state.advance().unwrap();
        }

        let err = state.advance().unwrap_err();
        assert!(matches!(err, EngineError::Workflow(_)));
        assert!(err.to_string().contains("terminal state"));
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut state = WorkflowState::new(Task::new("do the thing"));
        state.advance().unwrap();
        state.fail(Stage::Researching, "backend exploded");

        assert_eq!(state.state, RunState::Error);
        assert!(state.advance().is_err());

        let failure = state.failure.as_ref().unwrap();
        assert_eq!(failure.stage, Stage::Researching);
        assert!(failure.message.contains("exploded"));
    }

    #[test]
    fn test_merge_routes_output_to_the_right_field() {
        let mut state = WorkflowState::new(Task::new("do the thing"));

        state.merge(Stage::Planning, "the plan".to_string());
        state.merge(Stage::Executing, "the result".to_string());

        assert_eq!(state.plan.as_deref(), Some("the plan"));
        assert_eq!(state.execution_result.as_deref(), Some("the result"));
        assert!(state.research.is_none());
    }

    #[test]
    fn test_final_result_prefers_execution_output() {
        let mut state = WorkflowState::new(Task::new("do the thing"));
        assert!(state.final_result().is_none());

        state.merge(Stage::Critiquing, "looks fine".to_string());
        assert_eq!(state.final_result(), Some("looks fine"));

        state.merge(Stage::Executing, "the result".to_string());
        assert_eq!(state.final_result(), Some("the result"));
    }
}
