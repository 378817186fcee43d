//! The poll/dispatch cycle: fetch, diff against the held snapshot, queue
//! events, and forward watched ones to the notifiers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::diff::{Diff, diff};
use crate::error::Result;
use crate::events::{Event, EventKind, WatchList};
use crate::model::Operation;
use crate::notifiers::Dispatcher;
use crate::source::OperationSource;

pub struct Watcher<S> {
    source: S,
    dispatcher: Dispatcher,
    watch_for: WatchList,
    tasks: Vec<Operation>,
    queue: VecDeque<Event>,
    last_update: Option<DateTime<Utc>>,
}

impl<S: OperationSource> Watcher<S> {
    pub fn new(source: S, dispatcher: Dispatcher, watch_for: WatchList) -> Self {
        Self {
            source,
            dispatcher,
            watch_for,
            tasks: Vec::new(),
            queue: VecDeque::new(),
            last_update: None,
        }
    }

    /// Take a baseline snapshot without queuing any events.
    ///
    /// Operations that already exist when watching starts are then only
    /// reported when they change.
    pub fn prime(&mut self) -> Result<usize> {
        let records = self.source.fetch()?;
        let Diff { tasks, .. } = diff(&self.tasks, records)?;
        self.tasks = tasks;
        self.last_update = Some(Utc::now());
        debug!(tasks = self.tasks.len(), "primed snapshot");
        Ok(self.tasks.len())
    }

    /// Fetch, diff, and queue the resulting events.
    ///
    /// On any error the snapshot and queue are left as they were.
    pub fn update(&mut self) -> Result<Vec<Event>> {
        let records = self.source.fetch()?;
        let Diff {
            tasks,
            events,
            missing,
        } = diff(&self.tasks, records)?;

        if missing > 0 {
            debug!(missing, "unfinished operations missing from listing");
        }
        self.tasks = tasks;
        self.queue.extend(events.iter().cloned());
        self.last_update = Some(Utc::now());
        debug!(
            tasks = self.tasks.len(),
            active = self.active_count(),
            events = events.len(),
            "updated snapshot"
        );
        Ok(events)
    }

    /// Drain the queue, notifying for watched events and dropping the rest.
    ///
    /// Returns how many events were delivered. A notifier error stops the
    /// drain and is returned; the failed event is not requeued.
    pub fn dispatch(&mut self) -> Result<usize> {
        let mut delivered = 0;
        while let Some(event) = self.queue.pop_front() {
            if !self.watch_for.contains(event.kind()) {
                debug!(kind = %event.kind(), "event not watched, dropping");
                continue;
            }
            self.dispatcher.notify(event.title(), &event.message())?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Best-effort crash notification, sent only when errors are watched.
    ///
    /// Returns whether a notification went out.
    pub fn notify_error(&self) -> bool {
        if !self.watch_for.contains(EventKind::Error) {
            return false;
        }
        let event = Event::error();
        match self.dispatcher.notify(event.title(), &event.message()) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "failed to send error notification");
                false
            }
        }
    }
}

impl<S> Watcher<S> {
    /// The current snapshot in display order.
    pub fn tasks(&self) -> &[Operation] {
        &self.tasks
    }

    pub fn active_tasks(&self) -> impl Iterator<Item = &Operation> {
        self.tasks.iter().filter(|op| !op.done())
    }

    pub fn active_count(&self) -> usize {
        self.active_tasks().count()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn watch_list(&self) -> &WatchList {
        &self.watch_for
    }

    pub fn is_watched(&self, kind: EventKind) -> bool {
        self.watch_for.contains(kind)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
