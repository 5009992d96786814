//! Command-line interface for courier, built on clap.
//!
//! Defines the [`Cli`] struct with subcommands [`Command`] (chat,
//! transcribe, worker, status) and global flags (--concurrency,
//! --max-retries, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Courier — resilient LLM request dispatcher.
#[derive(Debug, Parser)]
#[command(name = "courier", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Bound on concurrently in-flight provider calls (local mode).
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Maximum retry attempts for a failing provider call.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Enable verbose output.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a chat message through the dispatcher and print the reply.
    Chat {
        /// The user message to send.
        message: String,

        /// Model override for this call.
        #[arg(long)]
        model: Option<String>,
    },

    /// Transcribe an audio file through the dispatcher.
    Transcribe {
        /// Path to the audio file.
        file: PathBuf,

        /// Spoken language hint passed to the provider.
        #[arg(long)]
        language: Option<String>,
    },

    /// Run a distributed worker against the shared job queue.
    Worker,

    /// Show the dispatcher configuration this process would run with.
    Status,
}
