//! CLI interface for Maestro
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for controlling the engine.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Maestro Task Orchestration Engine
///
/// Routes natural-language tasks through a fixed pipeline of specialist
/// stages, choosing an inference backend per stage and learning from
/// feedback.
#[derive(Parser, Debug)]
#[command(name = "maestro")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API server
    Serve,

    /// Run a single task through the workflow and print the result
    Run {
        /// The task to process
        task: String,
    },

    /// Inspect recorded feedback
    Feedback {
        #[command(subcommand)]
        action: FeedbackAction,
    },

    /// Run system diagnostics
    Doctor,
}

/// Feedback inspection actions
#[derive(Subcommand, Debug)]
pub enum FeedbackAction {
    /// Show per-backend rating aggregates
    Summary,
}
