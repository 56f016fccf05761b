// Maestro Task Orchestration Engine
// Main entry point for the maestro binary

use clap::Parser;
use maestro_engine::cli::{Cli, Command, FeedbackAction};
use maestro_engine::config::Config;
use maestro_engine::handlers::{
    handle_doctor, handle_feedback_summary, handle_run, handle_serve, OutputFormat,
};
use maestro_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    tracing::info!("Maestro Engine v{}", env!("CARGO_PKG_VERSION"));

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Re-initialize telemetry with the CLI- or config-driven log level
    // (only takes effect if RUST_LOG env var is not set)
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    match cli.command {
        Command::Serve => {
            tracing::info!("Starting API server...");
            handle_serve(&config).await
        }

        Command::Run { task } => {
            tracing::info!("Processing task: {}", task);
            handle_run(task, &config, format).await
        }

        Command::Feedback { action } => match action {
            FeedbackAction::Summary => handle_feedback_summary(&config, format),
        },

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
