//! Facade over the task repository and the timer engine.
//!
//! The CLI goes through [`Tracker`] so every command sees the same data
//! directory, lock timeout and notifier.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::notify::{notifier_for, Notifier};
use crate::storage::Storage;
use crate::task::{Task, TaskRepository};
use crate::timer::{TimerEngine, TimerPoller};

#[derive(Debug, Clone)]
pub struct Tracker {
    config: Config,
    storage: Storage,
    tasks: TaskRepository,
    timers: TimerEngine,
}

impl Tracker {
    /// Open the data directory with the notifier named in `config`
    pub fn open(data_dir: PathBuf, config: Config) -> Result<Self> {
        let notifier = notifier_for(&config.notify);
        Self::with_notifier(data_dir, config, notifier)
    }

    pub fn with_notifier(
        data_dir: PathBuf,
        config: Config,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let storage = Storage::open(data_dir, config.store.lock_timeout_ms)?;
        tracing::debug!(data_dir = %storage.data_dir().display(), "tracker opened");
        Ok(Self {
            tasks: TaskRepository::new(&storage),
            timers: TimerEngine::new(&storage, notifier),
            config,
            storage,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn tasks(&self) -> &TaskRepository {
        &self.tasks
    }

    pub fn timers(&self) -> &TimerEngine {
        &self.timers
    }

    /// Delete a task, then cancel its pending timer
    ///
    /// The task goes first: if the cancel cannot be written the timer is
    /// left pending and later fires with its frozen message, exactly like
    /// a timer whose task was removed through [`TaskRepository::delete`].
    /// Fired timers stay behind as history.
    pub fn delete_task(&self, id: u64) -> Result<Task> {
        let task = self.tasks.delete(id)?;
        match self.timers.cancel_timer_for_task(id) {
            Ok(_) | Err(Error::NotFound { .. }) => {}
            Err(err) => {
                tracing::warn!(
                    task_id = id,
                    error = %err,
                    "timer left pending after task delete"
                );
            }
        }
        Ok(task)
    }

    /// Start the background poller at the configured interval
    pub fn start_poller(&self) -> Result<TimerPoller> {
        TimerPoller::spawn(self.timers.clone(), self.config.timers.poll_interval())
    }

    pub fn rows(&self) -> Result<Vec<TaskRow>> {
        self.rows_at(Utc::now())
    }

    /// One row per task, ordered by id, with timer totals as of `now`
    pub fn rows_at(&self, now: DateTime<Utc>) -> Result<Vec<TaskRow>> {
        let summaries = self.timers.summaries_at(now)?;
        Ok(self
            .tasks
            .list()?
            .into_iter()
            .map(|task| {
                let summary = summaries.get(&task.id).copied().unwrap_or_default();
                TaskRow::new(task, summary.elapsed, summary.running)
            })
            .collect())
    }

    pub fn row(&self, id: u64) -> Result<TaskRow> {
        let task = self.tasks.get(id)?;
        let now = Utc::now();
        let elapsed = self.timers.elapsed_time_at(id, now)?;
        let running = self.timers.has_running_timer(id)?;
        Ok(TaskRow::new(task, elapsed, running))
    }
}

/// Task plus its timer totals, as shown by `list` and `show`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRow {
    pub id: u64,
    pub name: String,
    pub status: String,
    pub priority: i64,
    pub tags: Vec<String>,
    pub elapsed_secs: i64,
    pub elapsed: String,
    pub running: bool,
}

impl TaskRow {
    pub fn new(task: Task, elapsed: Duration, running: bool) -> Self {
        Self {
            id: task.id,
            name: task.name,
            status: task.status,
            priority: task.priority,
            tags: task.tags,
            elapsed_secs: elapsed.num_seconds(),
            elapsed: format_elapsed(elapsed),
            running,
        }
    }
}

/// `0s`, `42s`, `5m03s`, `1h02m03s`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes:02}m{seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{lock_path_for, FileLock};
    use crate::notify::RecordingNotifier;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Tracker, Arc<RecordingNotifier>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let notifier = Arc::new(RecordingNotifier::new());
        let tracker =
            Tracker::with_notifier(dir.path().join("data"), Config::default(), notifier.clone())
                .expect("tracker");
        (dir, tracker, notifier)
    }

    #[test]
    fn open_creates_data_dir() {
        let (dir, tracker, _) = setup();
        assert!(dir.path().join("data").is_dir());
        assert!(tracker.storage().is_initialized());
    }

    #[test]
    fn delete_task_cancels_pending_timer() {
        let (_dir, tracker, notifier) = setup();
        let task = tracker.tasks().create("busy").unwrap();
        tracker
            .timers()
            .add_timer_for_task(task.id, Duration::minutes(5))
            .unwrap();

        tracker.delete_task(task.id).unwrap();
        assert!(tracker.timers().pending_timers().unwrap().is_empty());
        tracker
            .timers()
            .poll_at(Utc::now() + Duration::hours(1))
            .unwrap();
        assert_eq!(notifier.count(), 0);
    }

    #[test]
    fn delete_task_survives_timer_store_contention() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.store.lock_timeout_ms = 50;
        let tracker = Tracker::with_notifier(
            dir.path().join("data"),
            config,
            Arc::new(RecordingNotifier::new()),
        )
        .expect("tracker");
        let task = tracker.tasks().create("busy").unwrap();
        tracker
            .timers()
            .add_timer_for_task(task.id, Duration::minutes(5))
            .unwrap();

        let timers_lock = lock_path_for(tracker.timers().collection().path());
        let held = FileLock::acquire(&timers_lock, 1000).unwrap();
        assert_eq!(tracker.delete_task(task.id).unwrap().name, "busy");
        drop(held);

        assert!(tracker.tasks().get(task.id).is_err());
        assert_eq!(tracker.timers().pending_timers().unwrap().len(), 1);
    }

    #[test]
    fn delete_task_without_timer_succeeds() {
        let (_dir, tracker, _) = setup();
        let task = tracker.tasks().create("idle").unwrap();
        assert_eq!(tracker.delete_task(task.id).unwrap().name, "idle");
        assert!(matches!(
            tracker.delete_task(task.id),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn rows_include_timer_totals() {
        let (_dir, tracker, _) = setup();
        let start = Utc::now();
        let a = tracker.tasks().create("a").unwrap();
        let b = tracker.tasks().create("b").unwrap();
        tracker
            .timers()
            .add_timer_at(a.id, Duration::minutes(10), start)
            .unwrap();

        let rows = tracker.rows_at(start + Duration::minutes(2)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, a.id);
        assert!(rows[0].running);
        assert_eq!(rows[0].elapsed_secs, 120);
        assert_eq!(rows[0].elapsed, "2m00s");
        assert_eq!(rows[1].id, b.id);
        assert!(!rows[1].running);
        assert_eq!(rows[1].elapsed, "0s");
    }

    #[test]
    fn formats_elapsed() {
        assert_eq!(format_elapsed(Duration::zero()), "0s");
        assert_eq!(format_elapsed(Duration::seconds(42)), "42s");
        assert_eq!(format_elapsed(Duration::seconds(303)), "5m03s");
        assert_eq!(format_elapsed(Duration::seconds(3723)), "1h02m03s");
        assert_eq!(format_elapsed(Duration::seconds(-5)), "0s");
    }
}
