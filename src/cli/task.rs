//! Task commands: add, delete, update, list, show.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::{open_tracker, parse_task_id};
use crate::error::Result;
use crate::output::{emit_success, OutputOptions, Screen};
use crate::task::{is_known_status, Task, STATUS_DONE};
use crate::timer::TaskTimer;
use crate::tracker::TaskRow;

pub struct AddOptions {
    pub name: String,
    pub fields: Vec<String>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct DeleteOptions {
    pub id: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct UpdateOptions {
    pub id: String,
    pub fields: Vec<String>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct ListOptions {
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct ShowOptions {
    pub id: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct TaskReport {
    task: Task,
}

#[derive(Serialize)]
struct ListReport {
    total: usize,
    tasks: Vec<TaskRow>,
}

#[derive(Serialize)]
struct ShowReport {
    task: TaskRow,
    timers: Vec<TaskTimer>,
}

fn describe_task(screen: &mut Screen, task: &Task) {
    screen
        .field("id", task.id.to_string())
        .field("name", task.name.clone())
        .field("status", task.status.clone())
        .field("priority", task.priority.to_string());
    if !task.tags.is_empty() {
        screen.field("tags", task.tags.join(", "));
    }
    if !is_known_status(&task.status) {
        screen.warn(format!(
            "status '{}' is not one of TODO, DOING, DONE",
            task.status
        ));
    }
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let task = tracker.tasks().add(&options.name, options.fields.as_slice())?;

    let mut screen = Screen::new(format!("selfcontrol add: created task {}", task.id));
    describe_task(&mut screen, &task);
    screen.next(format!("selfcontrol timer {} 25m", task.id));

    emit_success(options.output, "add", &TaskReport { task }, &screen)
}

pub fn run_delete(options: DeleteOptions) -> Result<()> {
    let id = parse_task_id(&options.id)?;
    let tracker = open_tracker(options.data_dir)?;
    let task = tracker.delete_task(id)?;

    let mut screen = Screen::new(format!("selfcontrol delete: removed task {id}"));
    screen.field("name", task.name.clone());

    emit_success(options.output, "delete", &TaskReport { task }, &screen)
}

pub fn run_update(options: UpdateOptions) -> Result<()> {
    let id = parse_task_id(&options.id)?;
    let tracker = open_tracker(options.data_dir)?;
    let task = tracker.tasks().update_fields(id, options.fields.as_slice())?;

    let mut screen = Screen::new(format!("selfcontrol update: task {id}"));
    describe_task(&mut screen, &task);
    if task.status == STATUS_DONE {
        if let Some(timer) = tracker.timers().running_timer(id)? {
            screen.warn_running_timer(&timer, chrono::Utc::now());
        }
    }

    emit_success(options.output, "update", &TaskReport { task }, &screen)
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let tracker = open_tracker(options.data_dir)?;
    let rows = tracker.rows()?;

    let mut screen = Screen::new(format!("selfcontrol list: {} task(s)", rows.len()));
    for row in &rows {
        screen.task_row(row);
    }
    if rows.is_empty() {
        screen.next("selfcontrol add <name>");
    }

    let report = ListReport {
        total: rows.len(),
        tasks: rows,
    };
    emit_success(options.output, "list", &report, &screen)
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let id = parse_task_id(&options.id)?;
    let tracker = open_tracker(options.data_dir)?;
    let row = tracker.row(id)?;
    let timers = tracker.timers().timers_for_task(id)?;

    let mut screen = Screen::new(format!("selfcontrol show: task {id}"));
    screen
        .field("name", row.name.clone())
        .field("status", row.status.clone())
        .field("priority", row.priority.to_string());
    if !row.tags.is_empty() {
        screen.field("tags", row.tags.join(", "));
    }
    screen
        .field("elapsed", row.elapsed.clone())
        .field("running", if row.running { "yes" } else { "no" });

    let now = chrono::Utc::now();
    for timer in &timers {
        screen.timer(timer, now);
    }

    let report = ShowReport { task: row, timers };
    emit_success(options.output, "show", &report, &screen)
}
