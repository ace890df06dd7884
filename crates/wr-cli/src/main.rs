// SPDX-License-Identifier: MIT OR Apache-2.0

//! wr - thin CLI plumbing over the durable execution core.
//!
//! This binary wires the real session gate, event log, snapshot store,
//! and token codec to a data directory on disk. It has no workflow
//! interpreter or workflow source loader of its own: both are explicitly
//! out of scope for the core, so this CLI drives the engine with the
//! same fake collaborators the engine's own tests use, enabled through
//! the `test-support` feature. A production deployment wires a real
//! `WorkflowProvider`/`Advance` pair in their place.

mod engine_wiring;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use wr_engine::{AdvanceInput, AdvanceRequest};

#[derive(Parser)]
#[command(name = "wr", version, about = "WorkRail durable execution core CLI")]
struct Cli {
    /// Data directory root; defaults to the platform data dir.
    #[arg(short = 'd', long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new workflow run.
    Start {
        workflow_id: String,
        /// JSON context blob, defaults to `{}`.
        #[arg(long)]
        context: Option<String>,
    },
    /// Advance a session one step using a state/ack token pair.
    Continue {
        state_token: String,
        ack_token: String,
        #[arg(long)]
        input: Option<String>,
    },
    /// Re-render the current pending step without appending any events.
    Rehydrate { state_token: String },
    /// List resumable tips across a session's runs.
    Resume {
        session_id: String,
        #[arg(long, default_value_t = 10)]
        max_candidates: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let root = match cli.data_dir {
        Some(dir) => dir,
        None => wr_fs::DataDir::resolve()
            .context("failed to resolve a default data directory")?
            .root()
            .to_path_buf(),
    };
    let (engine, provider) = engine_wiring::wire(&root)?;

    let result = match cli.command {
        Commands::Start { workflow_id, context } => {
            engine_wiring::ensure_demo_workflow(&provider, &workflow_id);
            let context = parse_json_arg(context)?;
            wr_engine::start_workflow(&engine, &workflow_id, context).map_err(Into::into)
        }
        Commands::Continue { state_token, ack_token, input } => {
            let context = parse_json_arg(input)?;
            wr_engine::advance(
                &engine,
                AdvanceRequest {
                    state_token,
                    ack_token,
                    input: AdvanceInput { context },
                },
            )
            .map_err(Into::into)
        }
        Commands::Rehydrate { state_token } => {
            wr_engine::rehydrate(&engine, &state_token).map_err(Into::into)
        }
        Commands::Resume { session_id, max_candidates } => {
            return print_resume(&engine, &session_id, max_candidates);
        }
    };

    print_response(result)
}

fn parse_json_arg(raw: Option<String>) -> Result<serde_json::Value> {
    match raw {
        Some(raw) => serde_json::from_str(&raw).context("argument is not valid JSON"),
        None => Ok(serde_json::json!({})),
    }
}

fn print_response(result: Result<wr_engine::WorkflowResponse, anyhow::Error>) -> Result<()> {
    match result {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(err) => print_error(err),
    }
}

fn print_resume(engine: &wr_engine::Engine, session_id: &str, max_candidates: usize) -> Result<()> {
    match wr_engine::resume_session(engine, session_id, max_candidates) {
        Ok(candidates) => {
            println!("{}", serde_json::to_string_pretty(&candidates)?);
            Ok(())
        }
        Err(err) => print_error(err.into()),
    }
}

fn print_error(err: anyhow::Error) -> Result<()> {
    tracing::warn!(error = %err, "command failed");
    eprintln!("error: {err}");
    std::process::exit(1);
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
