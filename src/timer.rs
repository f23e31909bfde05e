//! Per-task countdown timers.
//!
//! A timer is PENDING until its expiry is observed by a polling pass, then
//! FIRED for good. A task has at most one PENDING timer; fired timers stay in
//! the `timers` collection as history and feed the elapsed-time total.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DurationUnit;
use crate::error::{EntityKind, Error, Result};
use crate::notify::Notifier;
use crate::storage::{Collection, Document, Storage};
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimerState {
    Pending,
    Fired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTimer {
    #[serde(default)]
    pub id: u64,
    pub task_id: u64,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Frozen at creation; renaming the task later does not change it
    pub message: String,
    #[serde(default)]
    pub fired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fired_at: Option<DateTime<Utc>>,
}

impl TaskTimer {
    pub fn new(task: &Task, duration: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            task_id: task.id,
            started_at: now,
            expires_at: now + duration,
            message: timer_message(&task.name),
            fired: false,
            fired_at: None,
        }
    }

    pub fn state(&self) -> TimerState {
        if self.fired {
            TimerState::Fired
        } else {
            TimerState::Pending
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.fired
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.expires_at <= now
    }

    /// Scheduled length once fired, time since start while pending
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        let end = if self.fired { self.expires_at } else { now };
        (end - self.started_at).max(Duration::zero())
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        if self.fired {
            return Duration::zero();
        }
        (self.expires_at - now).max(Duration::zero())
    }
}

impl Document for TaskTimer {
    const COLLECTION: &'static str = "timers";
    const KIND: EntityKind = EntityKind::Timer;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

pub fn timer_message(task_name: &str) -> String {
    format!("Timer for '{task_name}' finished!")
}

/// Parse a timer duration such as `25`, `90s`, `25m` or `1h`
///
/// Bare numbers are read in `unit`. The result must be positive.
pub fn parse_timer_duration(input: &str, unit: DurationUnit) -> Result<Duration> {
    let s = input.trim();
    let invalid = || Error::InvalidNumericArgument(input.to_string());

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, ""),
    };
    let num: i64 = num_str.parse().map_err(|_| invalid())?;

    let duration = match suffix.to_ascii_lowercase().as_str() {
        "" => match unit {
            DurationUnit::Minutes => Duration::try_minutes(num),
            DurationUnit::Seconds => Duration::try_seconds(num),
        },
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(num),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(num),
        "h" | "hr" | "hour" | "hours" => Duration::try_hours(num),
        _ => None,
    }
    .ok_or_else(invalid)?;

    if duration <= Duration::zero() {
        return Err(invalid());
    }
    Ok(duration)
}

/// Elapsed total and running flag for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSummary {
    pub elapsed: Duration,
    pub running: bool,
}

impl Default for TimerSummary {
    fn default() -> Self {
        Self {
            elapsed: Duration::zero(),
            running: false,
        }
    }
}

#[derive(Clone)]
pub struct TimerEngine {
    tasks: Collection<Task>,
    timers: Collection<TaskTimer>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("timers", &self.timers.path())
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    pub fn new(storage: &Storage, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            tasks: storage.collection(),
            timers: storage.collection(),
            notifier,
        }
    }

    pub fn collection(&self) -> &Collection<TaskTimer> {
        &self.timers
    }

    pub fn add_timer_for_task(&self, task_id: u64, duration: Duration) -> Result<TaskTimer> {
        self.add_timer_at(task_id, duration, Utc::now())
    }

    /// Start a timer as if the current time were `now`
    pub fn add_timer_at(
        &self,
        task_id: u64,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<TaskTimer> {
        if duration <= Duration::zero() || now.checked_add_signed(duration).is_none() {
            return Err(Error::InvalidNumericArgument(format!(
                "{}s",
                duration.num_seconds()
            )));
        }
        let task = self.tasks.read(task_id)?;

        // The pending check and the insert share one locked transaction.
        let timer = self.timers.transact(|data| {
            if data
                .iter()
                .any(|timer| timer.task_id == task_id && timer.is_pending())
            {
                return Err(Error::DuplicateTimer { task_id });
            }
            let mut timer = TaskTimer::new(&task, duration, now);
            timer.id = data.insert(timer.clone())?;
            Ok(timer)
        })?;

        tracing::info!(
            task_id,
            timer_id = timer.id,
            expires_at = %timer.expires_at,
            "timer started"
        );
        Ok(timer)
    }

    /// Delete the task's pending timer; fired timers are never removed
    pub fn cancel_timer_for_task(&self, task_id: u64) -> Result<TaskTimer> {
        let timer = self.timers.transact(|data| {
            let id = data
                .iter()
                .find(|timer| timer.task_id == task_id && timer.is_pending())
                .map(|timer| timer.id)
                .ok_or_else(|| Error::timer_not_found(task_id))?;
            data.remove(id)
        })?;
        tracing::info!(task_id, timer_id = timer.id, "timer cancelled");
        Ok(timer)
    }

    pub fn poll(&self) -> Result<Vec<TaskTimer>> {
        self.poll_at(Utc::now())
    }

    /// Fire every pending timer due at `now`, in store order
    ///
    /// The fired flag is persisted before any notification goes out, so a
    /// concurrent pass never sees the same timer as pending again.
    pub fn poll_at(&self, now: DateTime<Utc>) -> Result<Vec<TaskTimer>> {
        let fired = self.timers.transact(|data| {
            let due: Vec<u64> = data
                .iter()
                .filter(|timer| timer.is_due(now))
                .map(|timer| timer.id)
                .collect();
            let mut fired = Vec::with_capacity(due.len());
            for id in due {
                if let Some(timer) = data.get_mut(id) {
                    timer.fired = true;
                    timer.fired_at = Some(now);
                    fired.push(timer.clone());
                }
            }
            Ok(fired)
        })?;

        for timer in &fired {
            tracing::info!(task_id = timer.task_id, timer_id = timer.id, "timer fired");
            self.notifier.notify(&timer.message);
        }
        Ok(fired)
    }

    /// Every timer recorded for the task, oldest first
    pub fn timers_for_task(&self, task_id: u64) -> Result<Vec<TaskTimer>> {
        self.timers.find("task_id", &serde_json::Value::from(task_id))
    }

    pub fn running_timer(&self, task_id: u64) -> Result<Option<TaskTimer>> {
        Ok(self
            .timers_for_task(task_id)?
            .into_iter()
            .find(TaskTimer::is_pending))
    }

    pub fn has_running_timer(&self, task_id: u64) -> Result<bool> {
        Ok(self.running_timer(task_id)?.is_some())
    }

    pub fn pending_timers(&self) -> Result<Vec<TaskTimer>> {
        self.timers.find("fired", &serde_json::Value::Bool(false))
    }

    pub fn elapsed_time(&self, task_id: u64) -> Result<Duration> {
        self.elapsed_time_at(task_id, Utc::now())
    }

    pub fn elapsed_time_at(&self, task_id: u64, now: DateTime<Utc>) -> Result<Duration> {
        Ok(self
            .timers_for_task(task_id)?
            .iter()
            .fold(Duration::zero(), |total, timer| total + timer.elapsed_at(now)))
    }

    /// Elapsed totals and running flags for every task with timers
    pub fn summaries_at(&self, now: DateTime<Utc>) -> Result<HashMap<u64, TimerSummary>> {
        let mut summaries: HashMap<u64, TimerSummary> = HashMap::new();
        for timer in self.timers.all()? {
            let summary = summaries.entry(timer.task_id).or_default();
            summary.elapsed = summary.elapsed + timer.elapsed_at(now);
            summary.running |= timer.is_pending();
        }
        Ok(summaries)
    }
}

/// Background worker running [`TimerEngine::poll`] on a fixed interval
///
/// Dropping the handle (or calling [`TimerPoller::stop`]) ends the loop after
/// the current pass.
#[derive(Debug)]
pub struct TimerPoller {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TimerPoller {
    pub fn spawn(engine: TimerEngine, interval: std::time::Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("selfcontrol-timer-poller".to_string())
            .spawn(move || {
                tracing::debug!(interval_ms = interval.as_millis() as u64, "timer poller started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Err(err) = engine.poll() {
                                tracing::warn!(error = %err, "timer poll failed");
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("timer poller stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Block until the poller exits, which only happens on process exit
    pub fn join(mut self) {
        let _stop_tx = self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TimerPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
