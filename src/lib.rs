//! selfcontrol - personal task tracker library
//!
//! Tasks with a name, status, priority and tags, plus per-task countdown
//! timers that notify when they expire.
//!
//! # Core Concepts
//!
//! - **Tasks**: uniquely named records edited through `field:value` tokens
//! - **Timers**: at most one running timer per task; fired timers are kept
//!   as history and summed into the task's elapsed time
//! - **Polling**: a background worker marks due timers fired, then notifies
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `selfcontrol.toml`
//! - `error`: Error types and result aliases
//! - `lock`: File locking and atomic writes
//! - `storage`: JSON document collections in the data directory
//! - `task`: Task entity, repository and field-update parsing
//! - `timer`: Timer entity, timer engine and background poller
//! - `notify`: Notification sinks
//! - `tracker`: Facade used by the CLI
//! - `output`: Human and JSON output

pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod notify;
pub mod output;
pub mod storage;
pub mod task;
pub mod timer;
pub mod tracker;

pub use error::{Error, Result};
