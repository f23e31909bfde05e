//! Timer commands: timer, cancel, watch.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::{open_tracker, parse_task_id};
use crate::config::{resolve_data_dir, Config, NotifySink};
use crate::error::{Error, Result};
use crate::notify::sink_notifier;
use crate::output::{emit_success, OutputOptions, Screen};
use crate::timer::{parse_timer_duration, TaskTimer};
use crate::tracker::{format_elapsed, Tracker};

pub struct StartOptions {
    pub id: String,
    pub duration: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct CancelOptions {
    pub id: String,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub struct WatchOptions {
    pub interval_ms: Option<u64>,
    pub stdout: bool,
    pub once: bool,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct TimerReport {
    timer: TaskTimer,
    duration_secs: i64,
}

#[derive(Serialize)]
struct WatchReport {
    fired: Vec<TaskTimer>,
    pending: usize,
}

pub fn run_start(options: StartOptions) -> Result<()> {
    let id = parse_task_id(&options.id)?;
    let tracker = open_tracker(options.data_dir)?;
    let duration = parse_timer_duration(&options.duration, tracker.config().timers.duration_unit)?;
    let timer = tracker.timers().add_timer_for_task(id, duration)?;

    let mut screen = Screen::new(format!("selfcontrol timer: started for task {id}"));
    screen
        .field("duration", format_elapsed(duration))
        .timer(&timer, timer.started_at)
        .next("selfcontrol watch")
        .next(format!("selfcontrol cancel {id}"));

    let report = TimerReport {
        duration_secs: duration.num_seconds(),
        timer,
    };
    emit_success(options.output, "timer", &report, &screen)
}

pub fn run_cancel(options: CancelOptions) -> Result<()> {
    let id = parse_task_id(&options.id)?;
    let tracker = open_tracker(options.data_dir)?;
    let timer = tracker.timers().cancel_timer_for_task(id)?;

    let mut screen = Screen::new(format!("selfcontrol cancel: timer stopped for task {id}"));
    screen.field("ran for", format_elapsed(timer.elapsed_at(chrono::Utc::now())));

    let report = TimerReport {
        duration_secs: (timer.expires_at - timer.started_at).num_seconds(),
        timer,
    };
    emit_success(options.output, "cancel", &report, &screen)
}

pub fn run_watch(options: WatchOptions) -> Result<()> {
    let data_dir = resolve_data_dir(options.data_dir);
    let mut config = Config::load_from_dir(&data_dir);
    if let Some(interval_ms) = options.interval_ms {
        if interval_ms == 0 {
            return Err(Error::InvalidNumericArgument(interval_ms.to_string()));
        }
        config.timers.poll_interval_ms = interval_ms;
    }

    let sink = if options.stdout {
        NotifySink::Stdout
    } else {
        config.notify.sink
    };
    let notifier = sink_notifier(sink, &config.notify, options.output.json);
    let tracker = Tracker::with_notifier(data_dir, config, notifier)?;

    if options.once {
        let fired = tracker.timers().poll()?;
        let pending = tracker.timers().pending_timers()?.len();

        let mut screen = Screen::new(format!("selfcontrol watch: {} timer(s) fired", fired.len()));
        screen.field("pending", pending.to_string());
        // A console sink has already printed each message.
        if sink != NotifySink::Stdout {
            for timer in &fired {
                screen.message(timer.message.clone());
            }
        }

        return emit_success(
            options.output,
            "watch",
            &WatchReport { fired, pending },
            &screen,
        );
    }

    let pending = tracker.timers().pending_timers()?.len();
    tracing::info!(
        pending,
        interval_ms = tracker.config().timers.poll_interval_ms,
        "watching timers"
    );
    if !options.output.quiet && !options.output.json {
        println!("selfcontrol watch: {pending} pending timer(s); Ctrl-C to stop");
    }

    // Fire anything already overdue before the first interval elapses.
    tracker.timers().poll()?;
    tracker.start_poller()?.join();
    Ok(())
}
