//! Notification sinks for fired timers.
//!
//! Notifications are fire-and-forget: a sink that fails logs a warning and
//! the timer still counts as fired.

use std::process::Command;
use std::sync::{Arc, Mutex};

use crate::config::{NotifyConfig, NotifySink};

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Emits the message as a tracing event
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(%message, "timer notification");
    }
}

/// Prints the message on a terminal stream
///
/// `watch --json` owns stdout for its envelope, so it announces on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier {
    stderr: bool,
}

impl ConsoleNotifier {
    pub fn stdout() -> Self {
        Self { stderr: false }
    }

    pub fn stderr() -> Self {
        Self { stderr: true }
    }

    pub fn uses_stderr(&self) -> bool {
        self.stderr
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str) {
        if self.stderr {
            eprintln!("{message}");
        } else {
            println!("{message}");
        }
    }
}

/// Desktop notification through the platform's notifier command
///
/// macOS uses `osascript`, other unix systems `notify-send`. Platforms
/// without either fall back to a log line.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    title: String,
}

impl DesktopNotifier {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    fn command(&self, message: &str) -> Option<Command> {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                applescript_escape(message),
                applescript_escape(&self.title)
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            Some(cmd)
        } else if cfg!(unix) {
            let mut cmd = Command::new("notify-send");
            cmd.arg(&self.title).arg(message);
            Some(cmd)
        } else {
            None
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, message: &str) {
        let Some(mut cmd) = self.command(message) else {
            LogNotifier.notify(message);
            return;
        };
        match cmd.output() {
            Ok(output) if output.status.success() => {
                tracing::debug!(%message, "desktop notification sent");
            }
            Ok(output) => {
                tracing::warn!(
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "desktop notification failed"
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "desktop notifier unavailable");
            }
        }
    }
}

fn applescript_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self) -> usize {
        self.messages().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.to_string());
    }
}

/// Build the sink selected in configuration
pub fn notifier_for(config: &NotifyConfig) -> Arc<dyn Notifier> {
    sink_notifier(config.sink, config, false)
}

/// Build `sink`; with `json_stdout` a console sink moves to stderr
pub fn sink_notifier(
    sink: NotifySink,
    config: &NotifyConfig,
    json_stdout: bool,
) -> Arc<dyn Notifier> {
    match sink {
        NotifySink::Desktop => Arc::new(DesktopNotifier::new(config.title.clone())),
        NotifySink::Log => Arc::new(LogNotifier),
        NotifySink::Stdout if json_stdout => Arc::new(ConsoleNotifier::stderr()),
        NotifySink::Stdout => Arc::new(ConsoleNotifier::stdout()),
    }
}
