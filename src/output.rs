//! What selfcontrol commands print.
//!
//! A command hands [`emit_success`] two views of its result: a serializable
//! report for `--json`, and a [`Screen`] for the terminal. Screen warnings
//! and next steps also ride along in the JSON envelope.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::error::{EntityKind, Error, JsonError, Result};
use crate::timer::TaskTimer;
use crate::tracker::{format_elapsed, TaskRow};

pub const SCHEMA_VERSION: &str = "selfcontrol.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Terminal rendering of one command result
#[derive(Debug, Clone, Default)]
pub struct Screen {
    title: String,
    fields: Vec<(&'static str, String)>,
    tasks: Vec<String>,
    timers: Vec<String>,
    messages: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl Screen {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn field(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        self.fields.push((key, value.into()));
        self
    }

    pub fn task_row(&mut self, row: &TaskRow) -> &mut Self {
        self.tasks.push(task_line(row));
        self
    }

    pub fn timer(&mut self, timer: &TaskTimer, now: DateTime<Utc>) -> &mut Self {
        self.timers.push(timer_line(timer, now));
        self
    }

    /// A notification text, printed verbatim
    pub fn message(&mut self, text: impl Into<String>) -> &mut Self {
        self.messages.push(text.into());
        self
    }

    pub fn warn(&mut self, text: impl Into<String>) -> &mut Self {
        self.warnings.push(text.into());
        self
    }

    /// Warn that `timer` keeps counting after this command
    pub fn warn_running_timer(&mut self, timer: &TaskTimer, now: DateTime<Utc>) -> &mut Self {
        self.warn(format!(
            "timer #{} for task {} is still running, {} left",
            timer.id,
            timer.task_id,
            format_elapsed(timer.remaining_at(now))
        ));
        self.next(format!("selfcontrol cancel {}", timer.task_id))
    }

    pub fn next(&mut self, step: impl Into<String>) -> &mut Self {
        self.next_steps.push(step.into());
        self
    }

    pub fn render(&self) -> String {
        let mut out = vec![self.title.clone()];

        let width = self.fields.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in &self.fields {
            out.push(format!("  {key:<width$}  {value}"));
        }
        if !self.tasks.is_empty() {
            out.push(String::new());
            out.push(format!("{:>4}  {:<6} {:<4} NAME", "ID", "STATUS", "PRI"));
            out.extend(self.tasks.iter().cloned());
        }
        if !self.timers.is_empty() {
            out.push(String::new());
            out.push("Timers:".to_string());
            out.extend(self.timers.iter().map(|line| format!("  {line}")));
        }
        out.extend(self.messages.iter().cloned());
        for warning in &self.warnings {
            out.push(format!("warning: {warning}"));
        }
        for step in &self.next_steps {
            out.push(format!("next: {step}"));
        }

        out.join("\n")
    }
}

/// One `list` line: id, status, priority, name, tags, elapsed, running flag
pub fn task_line(row: &TaskRow) -> String {
    let mut line = format!(
        "{:>4}  {:<6} p{:<3} {}",
        row.id, row.status, row.priority, row.name
    );
    if !row.tags.is_empty() {
        line.push_str(&format!(" [{}]", row.tags.join(",")));
    }
    line.push_str(&format!("  {}", row.elapsed));
    if row.running {
        line.push_str(" (running)");
    }
    line
}

pub fn timer_line(timer: &TaskTimer, now: DateTime<Utc>) -> String {
    if timer.fired {
        format!(
            "#{} fired after {}, started {}",
            timer.id,
            format_elapsed(timer.elapsed_at(now)),
            timer.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        )
    } else {
        format!(
            "#{} running, {} left (until {})",
            timer.id,
            format_elapsed(timer.remaining_at(now)),
            timer.expires_at.with_timezone(&Local).format("%H:%M:%S")
        )
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    next_steps: Vec<String>,
}

fn print_json<T: Serialize>(envelope: &Envelope<'_, T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    report: &T,
    screen: &Screen,
) -> Result<()> {
    if options.json {
        return print_json(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data: Some(report),
            error: None,
            warnings: screen.warnings.clone(),
            next_steps: screen.next_steps.clone(),
        });
    }
    if !options.quiet {
        println!("{}", screen.render());
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        return print_json::<()>(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            data: None,
            error: Some(JsonError::from(err)),
            warnings: Vec::new(),
            next_steps,
        });
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

/// First positional argument, used to label error envelopes
pub fn infer_command_name_from_args() -> String {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--data-dir" {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg;
    }
    "selfcontrol".to_string()
}

pub fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::NotFound {
            kind: EntityKind::Task,
            ..
        } => vec!["selfcontrol list".to_string()],
        Error::NotFound {
            kind: EntityKind::Timer,
            ..
        } => vec!["selfcontrol timer <id> <duration>".to_string()],
        Error::DuplicateName(name) => vec![format!("pick a name other than '{name}'")],
        Error::DuplicateTimer { task_id } => vec![format!("selfcontrol cancel {task_id}")],
        Error::InvalidNumericArgument(_) => {
            vec!["use an integer, e.g. priority:3 or a duration like 25m".to_string()]
        }
        Error::InvalidArgument(_) => {
            vec!["fields are name:, status:, priority: and tags:".to_string()]
        }
        Error::InvalidConfig(_) => vec!["fix selfcontrol.toml then retry".to_string()],
        Error::LockFailed(_) => {
            vec!["another selfcontrol process holds the store; retry".to_string()]
        }
        _ => Vec::new(),
    }
}
