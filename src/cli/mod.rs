//! Command-line interface for selfcontrol
//!
//! This module defines the CLI structure using clap derive macros.
//! Task commands live in `task`, timer commands in `timer`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{resolve_data_dir, Config, DATA_DIR_ENV};
use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::tracker::Tracker;

mod task;
mod timer;

/// selfcontrol - personal task tracker
///
/// Tasks carry a name, status, priority and tags. Each task can run one
/// countdown timer at a time; `watch` fires notifications when they expire.
#[derive(Parser, Debug)]
#[command(name = "selfcontrol")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to ~/.selfcontrol)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a task, optionally setting fields (e.g. `pri:2 t:home`)
    Add {
        /// Unique task name
        name: String,

        /// Field updates: name:, status:, priority:, tags:
        fields: Vec<String>,
    },

    /// Delete a task and cancel its running timer
    Delete {
        /// Task ID
        id: String,
    },

    /// Apply field updates to a task, left to right
    Update {
        /// Task ID
        id: String,

        /// Field updates: name:, status:, priority:, tags:
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Start a countdown timer for a task
    Timer {
        /// Task ID
        id: String,

        /// Duration: bare number in the configured unit, or 30s / 25m / 1h
        duration: String,
    },

    /// Cancel a task's running timer
    Cancel {
        /// Task ID
        id: String,
    },

    /// List tasks with elapsed timer totals
    List,

    /// Show one task with its timer history
    Show {
        /// Task ID
        id: String,
    },

    /// Poll timers and send notifications as they expire
    Watch {
        /// Polling interval in milliseconds (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Print notifications on stdout instead of the configured sink
        #[arg(long)]
        stdout: bool,

        /// Run a single polling pass and exit
        #[arg(long)]
        once: bool,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Add { .. } => "add",
            Commands::Delete { .. } => "delete",
            Commands::Update { .. } => "update",
            Commands::Timer { .. } => "timer",
            Commands::Cancel { .. } => "cancel",
            Commands::List => "list",
            Commands::Show { .. } => "show",
            Commands::Watch { .. } => "watch",
        }
    }
}

/// Parse a task id argument
pub fn parse_task_id(raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::InvalidNumericArgument(raw.to_string()))
}

/// Load config from the data directory and open the tracker
pub(crate) fn open_tracker(data_dir: Option<PathBuf>) -> Result<Tracker> {
    let data_dir = resolve_data_dir(data_dir);
    let config = Config::load_from_dir(&data_dir);
    Tracker::open(data_dir, config)
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let data_dir = self.data_dir;

        match self.command {
            Commands::Add { name, fields } => task::run_add(task::AddOptions {
                name,
                fields,
                data_dir,
                output,
            }),
            Commands::Delete { id } => task::run_delete(task::DeleteOptions {
                id,
                data_dir,
                output,
            }),
            Commands::Update { id, fields } => task::run_update(task::UpdateOptions {
                id,
                fields,
                data_dir,
                output,
            }),
            Commands::List => task::run_list(task::ListOptions { data_dir, output }),
            Commands::Show { id } => task::run_show(task::ShowOptions {
                id,
                data_dir,
                output,
            }),
            Commands::Timer { id, duration } => timer::run_start(timer::StartOptions {
                id,
                duration,
                data_dir,
                output,
            }),
            Commands::Cancel { id } => timer::run_cancel(timer::CancelOptions {
                id,
                data_dir,
                output,
            }),
            Commands::Watch {
                interval_ms,
                stdout,
                once,
            } => timer::run_watch(timer::WatchOptions {
                interval_ms,
                stdout,
                once,
                data_dir,
                output,
            }),
        }
    }
}
