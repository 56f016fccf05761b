//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - serve: Run the HTTP API server
//! - run: Process a task through the workflow once
//! - feedback summary: Show per-backend rating aggregates
//! - doctor: Validate configuration and check backend reachability

use anyhow::Result;
use serde_json::json;

use crate::backend::BackendSet;
use crate::catalog::BackendCatalog;
use crate::config::Config;
use crate::feedback::FeedbackStore;
use crate::server;
use crate::workflow::types::{RunState, Task};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Run the HTTP API server until interrupted
pub async fn handle_serve(config: &Config) -> Result<()> {
    server::serve(config).await
}

/// Process a single task through the workflow and print the result
pub async fn handle_run(task: String, config: &Config, format: OutputFormat) -> Result<()> {
    let state = server::build_state(config).await?;

    if let OutputFormat::Text = format {
        println!("Processing task: {}", task);
        println!();
    }

    let run = state.orchestrator.run(Task::new(task)).await;

    match format {
        OutputFormat::Text => {
            for decision in &run.decisions {
                println!("  {} stage -> backend {}", decision.stage, decision.backend);
            }
            println!();

            match run.state {
                RunState::Done => {
                    println!("Result:");
                    println!("{}", run.final_result().unwrap_or_default());
                    if let Some(review) = &run.review {
                        println!();
                        println!("Review:");
                        println!("{}", review);
                    }
                    println!();
                    println!("✓ Task completed");
                }
                _ => {
                    if let Some(failure) = &run.failure {
                        println!("✗ Task failed at {} stage: {}", failure.stage, failure.message);
                    } else {
                        println!("✗ Task failed");
                    }
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "task_id": run.task.id,
                "status": run.state.as_str(),
                "plan": &run.plan,
                "research": &run.research,
                "execution_result": &run.execution_result,
                "review": &run.review,
                "decisions": &run.decisions,
                "failure": &run.failure,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if run.state == RunState::Error {
        let cause = run
            .failure
            .as_ref()
            .map(|f| format!("{} stage: {}", f.stage, f.message))
            .unwrap_or_else(|| "unknown cause".to_string());
        return Err(anyhow::anyhow!("workflow failed at {}", cause));
    }

    Ok(())
}

/// Show per-backend rating aggregates
pub fn handle_feedback_summary(config: &Config, format: OutputFormat) -> Result<()> {
    let store = FeedbackStore::open(&config.feedback_log_path())?;
    let summary = store.summary();

    match format {
        OutputFormat::Text => {
            if summary.is_empty() {
                println!("No feedback recorded yet");
                return Ok(());
            }

            println!("Feedback summary ({} entries):", store.total_entries());
            println!();
            for aggregate in summary.values() {
                println!(
                    "  {:12} {:3} ratings, mean {:.2}",
                    aggregate.backend, aggregate.count, aggregate.mean_rating
                );
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "total_feedback_entries": store.total_entries(),
                "backends": summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Validate configuration and check backend reachability
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let catalog = BackendCatalog::from_config(&config.backends)?;
    let backends = BackendSet::from_catalog(&catalog, &config.backends);
    let health = backends.check_health().await;

    let feedback_ok = FeedbackStore::open(&config.feedback_log_path()).is_ok();
    let memory_ok = crate::db::Database::new(&config.memory_db_path()).await.is_ok();

    match format {
        OutputFormat::Text => {
            println!("Configuration: ok ({} backends)", catalog.len());
            println!(
                "Feedback log:  {} ({})",
                if feedback_ok { "ok" } else { "unavailable" },
                config.feedback_log_path().display()
            );
            println!(
                "Memory store:  {} ({})",
                if memory_ok { "ok" } else { "unavailable" },
                config.memory_db_path().display()
            );
            println!("Backends ({}):", config.backends.base_url);
            for (name, healthy) in &health {
                println!(
                    "  {:12} {}",
                    name,
                    if *healthy { "reachable" } else { "unreachable" }
                );
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "config": { "backends": catalog.len() },
                "feedback_log": feedback_ok,
                "memory_store": memory_ok,
                "backends": health
                    .iter()
                    .map(|(name, healthy)| json!({ "name": name, "reachable": healthy }))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
