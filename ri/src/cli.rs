//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::events::{RunId, StageId, SubscriptionId};
use crate::filter::EventFilter;

/// rxinspect - reactive pipeline lifecycle inspector
#[derive(Parser)]
#[command(
    name = "ri",
    about = "Inspect recorded reactive pipeline lifecycle events",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Run to inspect (default: every run for print/summarize, latest otherwise)
    #[arg(short, long, global = true)]
    pub run: Option<RunId>,

    /// Only keep stages with an id up to this one
    #[arg(long = "max-stage", global = true, value_name = "ID")]
    pub max_stage: Option<StageId>,

    /// Only keep events of this subscription
    #[arg(long, global = true, value_name = "ID")]
    pub subscription: Option<SubscriptionId>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Event filter from the global filter flags
    pub fn filter(&self) -> EventFilter {
        EventFilter {
            max_stage_id: self.max_stage,
            subscription_id: self.subscription,
        }
    }
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print every event grouped by run, stage and subscription
    Print {
        /// Event log (JSON array or NDJSON)
        file: Option<PathBuf>,
    },

    /// Per-stage statistics and warnings for each run
    Summarize {
        /// Event log (JSON array or NDJSON)
        file: Option<PathBuf>,
    },

    /// Operator tree of one run, with generic wrapper stages collapsed
    Tree {
        /// Event log (JSON array or NDJSON)
        file: Option<PathBuf>,
    },

    /// Marble diagram of one stage
    Marble {
        /// Event log (JSON array or NDJSON)
        file: Option<PathBuf>,

        /// Stage to draw
        #[arg(short, long)]
        stage: StageId,

        /// Characters per second
        #[arg(long)]
        scale: Option<u32>,
    },

    /// Tick-quantized timeline of one run
    Timeline {
        /// Event log (JSON array or NDJSON)
        file: Option<PathBuf>,

        /// Tick width in milliseconds
        #[arg(long = "tick-ms")]
        tick_ms: Option<u64>,

        /// Number of ticks; later events collapse into the last one
        #[arg(long = "max-ticks")]
        max_ticks: Option<u64>,

        /// Wrap the output in a Mermaid `timeline` block
        #[arg(long)]
        mermaid: bool,

        /// Title of the Mermaid block
        #[arg(long)]
        title: Option<String>,
    },

    /// Mermaid flowchart of one run with per-stage statistics
    Mermaid {
        /// Event log (JSON array or NDJSON)
        file: Option<PathBuf>,
    },

    /// Report events that reference a subscription before it subscribed
    Check {
        /// Event log (JSON array or NDJSON)
        file: Option<PathBuf>,
    },

    /// Record the built-in sample pipeline into an event log
    Demo {
        /// Event log to append to
        file: Option<PathBuf>,
    },
}

impl Command {
    /// The log file argument, if one was given
    pub fn file(&self) -> Option<&PathBuf> {
        debug!(command = ?self, "Command::file: called");
        match self {
            Command::Print { file }
            | Command::Summarize { file }
            | Command::Tree { file }
            | Command::Marble { file, .. }
            | Command::Timeline { file, .. }
            | Command::Mermaid { file }
            | Command::Check { file }
            | Command::Demo { file } => file.as_ref(),
        }
    }
}

/// Get the path to the rxinspect log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rxinspect")
        .join("logs")
        .join("rxinspect.log")
}

/// Generate the after_help text
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let mut help = String::new();

    help.push_str("Event logs:\n");
    help.push_str("  One JSON record per line (NDJSON) or a single JSON array of records.\n");
    help.push_str("  Without a FILE argument the `log-file` config value is used.\n");

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));

    help
}
