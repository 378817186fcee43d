use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, info};

use crate::cli::{StartArgs, TasksArgs, TestArgs};
use crate::config::Config;
use crate::events::{WatchList, sort_events_by_time};
use crate::exit_codes::exit;
use crate::model;
use crate::notifiers::Dispatcher;
use crate::reporter::Reporter;
use crate::schedule::Schedule;
use crate::source::OperationSource;
use crate::watcher::Watcher;

/// Longest uninterrupted sleep while waiting for the next poll.
const TICK: Duration = Duration::from_millis(250);

pub fn start(args: StartArgs, config: &Config) -> Result<i32> {
    // Resolve everything up front so configuration errors surface before polling.
    let watch_for = WatchList::parse(&config.watch_names(&args.watch_for))?;
    let interval = config.interval(args.interval_mins)?;
    let dispatcher = Dispatcher::from_names(&config.notifier_names(&args.notifiers), config)?;
    let source = config.source(
        args.source.source_file.as_deref(),
        args.source.source_cmd.as_deref(),
    )?;

    info!(
        notifiers = ?dispatcher.names(),
        watching = %watch_for,
        interval = %humantime::format_duration(interval),
        "starting watcher"
    );

    let interrupted = install_interrupt_handler()?;
    let mut watcher = Watcher::new(source, dispatcher, watch_for);
    let mut reporter = Reporter::new(args.json);
    watch(&mut watcher, Schedule::new(interval), &interrupted, &mut reporter)
        .context("watcher stopped")?;
    debug!("{}", reporter.summary());
    Ok(exit::SUCCESS)
}

/// Run the poll loop until interrupted.
///
/// If the loop fails and errors are watched, one crash notification is
/// attempted before the error is returned.
pub fn watch<S: OperationSource>(
    watcher: &mut Watcher<S>,
    schedule: Schedule,
    interrupted: &AtomicBool,
    reporter: &mut Reporter,
) -> crate::Result<()> {
    let result = poll_loop(watcher, schedule, interrupted, reporter);
    if result.is_err() && watcher.notify_error() {
        info!("sent error notification");
    }
    result
}

fn poll_loop<S: OperationSource>(
    watcher: &mut Watcher<S>,
    mut schedule: Schedule,
    interrupted: &AtomicBool,
    reporter: &mut Reporter,
) -> crate::Result<()> {
    let Some(tasks) = unless_interrupted(watcher.prime(), interrupted)? else {
        return Ok(());
    };
    schedule.mark(Instant::now());
    info!(tasks, active = watcher.active_count(), "tracking tasks");

    loop {
        if interrupted.load(Ordering::SeqCst) {
            info!("interrupted, shutting down");
            return Ok(());
        }

        let now = Instant::now();
        if !schedule.is_due(now) {
            wait_for_next_poll(&schedule, now, watcher.active_count(), interrupted);
            continue;
        }

        schedule.mark(now);
        let Some(mut events) = unless_interrupted(watcher.update(), interrupted)? else {
            return Ok(());
        };
        let Some(delivered) = unless_interrupted(watcher.dispatch(), interrupted)? else {
            return Ok(());
        };
        debug!(events = events.len(), delivered, "poll complete");

        sort_events_by_time(&mut events);
        let remaining = watcher.active_count();
        for event in &events {
            reporter.event(event, remaining, watcher.is_watched(event.kind()));
        }
    }
}

/// Treat a failure that follows Ctrl-C as part of shutting down.
///
/// SIGINT also reaches a running source command, so its fetch fails; that
/// is a clean exit, not a crash. Returns `Ok(None)` in that case.
fn unless_interrupted<T>(
    result: crate::Result<T>,
    interrupted: &AtomicBool,
) -> crate::Result<Option<T>> {
    match result {
        Err(err) if interrupted.load(Ordering::SeqCst) => {
            info!(error = %err, "interrupted during poll, shutting down");
            Ok(None)
        }
        other => other.map(Some),
    }
}

/// Sleep in short slices until the next poll is due or an interrupt arrives.
fn wait_for_next_poll(schedule: &Schedule, now: Instant, active: usize, interrupted: &AtomicBool) {
    let remaining = schedule.remaining(now);
    let next_update = Local::now()
        + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero());
    let message = format!(
        "Next update at {}... ({active} active tasks)",
        next_update.format("%H:%M:%S")
    );
    debug!("{message}");

    #[cfg(feature = "cli")]
    let spinner = {
        let spinner = indicatif::ProgressBar::new_spinner();
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    };

    let deadline = now + remaining;
    loop {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        std::thread::sleep(left.min(TICK));
    }

    #[cfg(feature = "cli")]
    spinner.finish_and_clear();
}

fn install_interrupt_handler() -> Result<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(interrupted)
}

pub fn tasks(args: TasksArgs, config: &Config) -> Result<i32> {
    let source = config.source(
        args.source.source_file.as_deref(),
        args.source.source_cmd.as_deref(),
    )?;
    let mut watcher = Watcher::new(source, Dispatcher::default(), WatchList::default());
    watcher
        .prime()
        .context("failed to fetch operations")?;
    Reporter::new(args.json).tasks(watcher.tasks(), args.max_tasks);
    Ok(exit::SUCCESS)
}

pub fn test(args: TestArgs, config: &Config) -> Result<i32> {
    let dispatcher = Dispatcher::from_names(&config.notifier_names(&args.notifiers), config)?;
    dispatcher.notify(
        "Notification Test",
        "If you receive this notification, taskwatch is working!",
    )?;
    info!(notifiers = ?dispatcher.names(), "notification sent");
    Ok(exit::SUCCESS)
}

pub fn schema() -> Result<i32> {
    println!("{}", model::generate_schema());
    Ok(exit::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::events::EventKind;
    use crate::fixtures::{RecordingNotifier, record};
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;

    fn quick() -> Schedule {
        Schedule::new(Duration::from_millis(1))
    }

    #[test]
    fn interrupt_before_first_poll_returns_cleanly() {
        let (notifier, log) = RecordingNotifier::new("rec");
        let source = || -> crate::Result<Vec<Value>> { Ok(vec![record("a", "PENDING").build()]) };
        let mut watcher = Watcher::new(
            source,
            Dispatcher::new(vec![Box::new(notifier)]),
            WatchList::all(),
        );
        let interrupted = AtomicBool::new(true);
        watch(&mut watcher, quick(), &interrupted, &mut Reporter::new(true)).unwrap();
        assert_eq!(watcher.tasks().len(), 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn polls_and_dispatches_until_interrupted() {
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        let calls = AtomicUsize::new(0);
        let source = move || -> crate::Result<Vec<Value>> {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                return Ok(vec![record("a", "RUNNING").build()]);
            }
            flag.store(true, Ordering::SeqCst);
            Ok(vec![record("a", "SUCCEEDED").build()])
        };
        let (notifier, log) = RecordingNotifier::new("rec");
        let mut watcher = Watcher::new(
            source,
            Dispatcher::new(vec![Box::new(notifier)]),
            WatchList::new([EventKind::Completed]),
        );

        watch(&mut watcher, quick(), &interrupted, &mut Reporter::new(true)).unwrap();

        let sent = log.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Task Completed");
        assert_eq!(watcher.active_count(), 0);
    }

    #[test]
    fn fetch_failure_sends_error_notification() {
        let calls = AtomicUsize::new(0);
        let source = move || -> crate::Result<Vec<Value>> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![])
            } else {
                Err(Error::Fetch("connection reset".into()))
            }
        };
        let (notifier, log) = RecordingNotifier::new("rec");
        let mut watcher = Watcher::new(
            source,
            Dispatcher::new(vec![Box::new(notifier)]),
            WatchList::default(),
        );
        let interrupted = AtomicBool::new(false);

        let err = watch(&mut watcher, quick(), &interrupted, &mut Reporter::new(true)).unwrap_err();

        assert!(matches!(err, Error::Fetch(_)));
        let sent = log.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Oops!");
    }

    #[test]
    fn interrupted_fetch_is_a_clean_shutdown() {
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        let calls = AtomicUsize::new(0);
        let source = move || -> crate::Result<Vec<Value>> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(vec![record("a", "RUNNING").build()]);
            }
            flag.store(true, Ordering::SeqCst);
            Err(Error::Fetch("'list-ops' exited with signal: 2 (SIGINT)".into()))
        };
        let (notifier, log) = RecordingNotifier::new("rec");
        let mut watcher = Watcher::new(
            source,
            Dispatcher::new(vec![Box::new(notifier)]),
            WatchList::all(),
        );

        watch(&mut watcher, quick(), &interrupted, &mut Reporter::new(true)).unwrap();

        assert!(log.borrow().is_empty());
        assert_eq!(watcher.tasks().len(), 1);
        assert_eq!(watcher.tasks()[0].state().as_str(), "RUNNING");
    }

    #[test]
    fn interrupted_first_fetch_is_a_clean_shutdown() {
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        let source = move || -> crate::Result<Vec<Value>> {
            flag.store(true, Ordering::SeqCst);
            Err(Error::Fetch("interrupted".into()))
        };
        let (notifier, log) = RecordingNotifier::new("rec");
        let mut watcher = Watcher::new(
            source,
            Dispatcher::new(vec![Box::new(notifier)]),
            WatchList::all(),
        );

        watch(&mut watcher, quick(), &interrupted, &mut Reporter::new(true)).unwrap();
        assert!(log.borrow().is_empty());
        assert!(watcher.tasks().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn interrupted_source_command_is_a_clean_shutdown() {
        use crate::source::CommandSource;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("polled");
        let command = format!(
            "if [ -e '{m}' ]; then kill -INT $$; fi; touch '{m}'; echo '[]'",
            m = marker.display()
        );
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        let mut inner = CommandSource::new(command);
        let source = move || -> crate::Result<Vec<Value>> {
            let result = inner.fetch();
            if result.is_err() {
                // What the Ctrl-C handler does when the terminal's SIGINT arrives.
                flag.store(true, Ordering::SeqCst);
            }
            result
        };
        let (notifier, log) = RecordingNotifier::new("rec");
        let mut watcher = Watcher::new(
            source,
            Dispatcher::new(vec![Box::new(notifier)]),
            WatchList::all(),
        );

        watch(&mut watcher, quick(), &interrupted, &mut Reporter::new(true)).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn unknown_notifier_fails_before_polling() {
        let args = StartArgs {
            notifiers: vec!["pushbulet".into()],
            ..StartArgs::default()
        };
        let err = start(args, &Config::default()).unwrap_err();
        let err = err.downcast_ref::<Error>().unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("did you mean 'pushbullet'"));
    }

    #[test]
    fn unknown_event_fails_before_polling() {
        let args = StartArgs {
            watch_for: vec!["complted".into()],
            ..StartArgs::default()
        };
        let err = start(args, &Config::default()).unwrap_err();
        assert!(err.downcast_ref::<Error>().unwrap().is_config());
    }
}
