//! Stage Executors
//!
//! The four specialist roles are a closed set selected by the
//! orchestrator's current stage, all sharing one `run` contract. Each
//! variant composes its own instruction text and feeds the accumulated
//! workflow state plus the run's memory context to the chosen backend.

use crate::backend::{BackendError, InferenceBackend, Message};
use crate::workflow::types::{Stage, WorkflowState};

/// Specialist executing one workflow stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExecutor {
    Planner,
    Researcher,
    Executor,
    Critic,
}

impl StageExecutor {
    /// The executor responsible for the given stage
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Planning => StageExecutor::Planner,
            Stage::Researching => StageExecutor::Researcher,
            Stage::Executing => StageExecutor::Executor,
            Stage::Critiquing => StageExecutor::Critic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StageExecutor::Planner => "planner",
            StageExecutor::Researcher => "researcher",
            StageExecutor::Executor => "executor",
            StageExecutor::Critic => "critic",
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            StageExecutor::Planner => {
                "You are a planning specialist. Break the given task into clear, \
                 actionable, numbered steps; identify dependencies, execution order, \
                 and likely challenges. Be specific and actionable."
            }
            StageExecutor::Researcher => {
                "You are a research specialist. Identify what information a task \
                 needs, gather and synthesize it, and present findings in a clear, \
                 organized manner. State plainly when information is missing."
            }
            StageExecutor::Executor => {
                "You are an execution specialist. Carry out the task step by step \
                 and produce the requested output in full. For coding tasks write \
                 clean, working code; always verify the output meets the \
                 requirements."
            }
            StageExecutor::Critic => {
                "You are a review specialist. Assess outputs for quality, accuracy, \
                 and completeness; identify issues and suggest concrete \
                 improvements. Be thorough but fair."
            }
        }
    }

    /// The stage request, composed from the task and the outputs of the
    /// stages that ran before this one.
    fn render_request(&self, state: &WorkflowState) -> String {
        let task = &state.task.text;
        let plan = state.plan.as_deref().unwrap_or_default();
        let research = state.research.as_deref().unwrap_or_default();
        let execution_result = state.execution_result.as_deref().unwrap_or_default();

        match self {
            StageExecutor::Planner => format!(
                "Create a detailed plan for the following task:\n\n\
                 Task: {task}\n\n\
                 Provide a step-by-step plan that breaks this task into actionable \
                 steps. Include any dependencies, prerequisites, or considerations."
            ),
            StageExecutor::Researcher => format!(
                "Based on the task and plan, identify what information or research \
                 is needed:\n\n\
                 Task: {task}\n\
                 Plan: {plan}\n\n\
                 What information should be gathered before execution?"
            ),
            StageExecutor::Executor => format!(
                "Execute the following task:\n\n\
                 Task: {task}\n\n\
                 Context/Requirements:\n\
                 Plan:\n{plan}\n\n\
                 Research:\n{research}\n\n\
                 Provide the complete output or result."
            ),
            StageExecutor::Critic => format!(
                "Review the following output against the requirements:\n\n\
                 Output:\n{execution_result}\n\n\
                 Requirements:\n{task}\n\n\
                 Cover quality, requirement compliance, issues found, and \
                 suggestions for improvement."
            ),
        }
    }

    /// Build the conversation for this stage. The memory context retrieved
    /// at run intake is attached to the system message unchanged for every
    /// stage.
    pub fn build_messages(&self, state: &WorkflowState, memory_context: &str) -> Vec<Message> {
        let mut system = self.system_prompt().to_string();

        if !memory_context.is_empty() {
            system.push_str("\n\nRelevant prior work:\n");
            system.push_str(memory_context);
        }

        vec![Message::system(system), Message::user(self.render_request(state))]
    }

    /// Invoke the chosen backend for this stage and return its output
    pub async fn run(
        &self,
        backend: &dyn InferenceBackend,
        state: &WorkflowState,
        memory_context: &str,
    ) -> Result<String, BackendError> {
        let messages = self.build_messages(state, memory_context);

        tracing::debug!(
            "Running {} stage against backend {}",
            self.name(),
            backend.name()
        );

        let completion = backend.generate(&messages).await?;
        Ok(completion.content)
    }
}
