//! Orchestrator
//!
//! Drives one task through the fixed stage order, asking the router for a
//! backend before every stage and folding each stage's output into the
//! accumulated workflow state. Each run owns its state exclusively;
//! concurrent runs share nothing but the feedback aggregates and the
//! memory store, which synchronize themselves.
//!
//! The run future is the unit of cancellation: stages execute as
//! sequential awaits, so dropping the future stops any further stage
//! invocations without disturbing state other runs have committed.

use crate::backend::router::BackendRouter;
use crate::backend::BackendSet;
use crate::memory::{format_context, MemoryPort};
use crate::workflow::stages::StageExecutor;
use crate::workflow::types::{RunState, Task, WorkflowState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Sequences the workflow stages for one task at a time
pub struct Orchestrator {
    router: Arc<BackendRouter>,
    backends: Arc<BackendSet>,
    memory: Arc<dyn MemoryPort>,
    stage_timeout: Duration,
    retrieve_k: usize,
}

impl Orchestrator {
    pub fn new(
        router: Arc<BackendRouter>,
        backends: Arc<BackendSet>,
        memory: Arc<dyn MemoryPort>,
        stage_timeout: Duration,
        retrieve_k: usize,
    ) -> Self {
        Self {
            router,
            backends,
            memory,
            stage_timeout,
            retrieve_k,
        }
    }

    /// Process a task through the full workflow.
    ///
    /// The returned state is terminal: `Done` with all four stage outputs
    /// populated, or `Error` with the failing stage and cause recorded. A
    /// stage failure aborts the run — there is no retry and no substitute
    /// backend, since silent substitution would hide selection-quality
    /// signal.
    pub async fn run(&self, task: Task) -> WorkflowState {
        let start = Instant::now();
        let mut state = WorkflowState::new(task);

        info!("Starting workflow for task {}", state.task.id);

        // Memory context is fetched once and passed unchanged to every
        // stage. Retrieval failure degrades to an empty context.
        let memory_context = match self.memory.retrieve(&state.task.text, self.retrieve_k).await
        {
            Ok(entries) => {
                info!(
                    "Retrieved {} memory entries for task {}",
                    entries.len(),
                    state.task.id
                );
                format_context(&entries)
            }
            Err(e) => {
                warn!("Memory retrieval failed for task {}: {:#}", state.task.id, e);
                String::new()
            }
        };

        while let RunState::Stage(stage) = state.state {
            let decision = match self.router.select(&state.task, stage) {
                Ok(decision) => decision,
                Err(e) => {
                    error!("Task {}: {}", state.task.id, e);
                    state.fail(stage, e.to_string());
                    continue;
                }
            };

            let backend_name = decision.backend.clone();
            state.record_decision(decision);

            let Some(backend) = self.backends.get(&backend_name) else {
                error!(
                    "Task {}: no client registered for backend {}",
                    state.task.id, backend_name
                );
                state.fail(
                    stage,
                    format!("no client registered for backend {}", backend_name),
                );
                continue;
            };

            info!(
                "Task {}: {} stage via backend {}",
                state.task.id, stage, backend_name
            );

            let executor = StageExecutor::for_stage(stage);
            let outcome = tokio::time::timeout(
                self.stage_timeout,
                executor.run(backend.as_ref(), &state, &memory_context),
            )
            .await;

            match outcome {
                Ok(Ok(output)) if !output.trim().is_empty() => {
                    state.merge(stage, output);
                    if let Err(e) = state.advance() {
                        error!("Task {}: {}", state.task.id, e);
                        state.fail(stage, e.to_string());
                    }
                }
                Ok(Ok(_)) => {
                    warn!(
                        "Task {}: backend {} returned empty output in {} stage",
                        state.task.id, backend_name, stage
                    );
                    state.fail(
                        stage,
                        format!("backend {} returned empty output", backend_name),
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        "Task {}: backend {} failed in {} stage: {}",
                        state.task.id, backend_name, stage, e
                    );
                    state.fail(stage, e.to_string());
                }
                Err(_) => {
                    warn!(
                        "Task {}: {} stage timed out after {}s",
                        state.task.id,
                        stage,
                        self.stage_timeout.as_secs()
                    );
                    state.fail(
                        stage,
                        format!(
                            "stage timed out after {}s",
                            self.stage_timeout.as_secs()
                        ),
                    );
                }
            }
        }

        match state.state {
            RunState::Done => {
                info!(
                    "Task {} completed in {:.1}s",
                    state.task.id,
                    start.elapsed().as_secs_f64()
                );
                self.store_result(&state).await;
            }
            _ => {
                if let Some(failure) = &state.failure {
                    info!(
                        "Task {} aborted at {} stage after {:.1}s: {}",
                        state.task.id,
                        failure.stage,
                        start.elapsed().as_secs_f64(),
                        failure.message
                    );
                }
            }
        }

        state
    }

    /// Best-effort persistence of a completed run into semantic memory.
    /// A store failure is logged and never escalated to a workflow error.
    async fn store_result(&self, state: &WorkflowState) {
        let Some(result) = state.final_result() else {
            return;
        };

        let text = format!("Task: {}\nResponse: {}", state.task.text, result);
        let backends: Vec<&str> = state.decisions.iter().map(|d| d.backend.as_str()).collect();
        let metadata = serde_json::json!({
            "type": "conversation",
            "task_id": state.task.id,
            "backends": backends,
        });

        if let Err(e) = self.memory.store(&text, metadata).await {
            warn!(
                "Failed to store result of task {} in memory: {:#}",
                state.task.id, e
            );
        }
    }
}
