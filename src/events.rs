use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::Error;
use crate::model::Operation;
use crate::suggest::close_matches;

/// The closed set of event kinds, used to select what gets notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Error,
    Failed,
    Completed,
    Created,
    Attempted,
    Cancelled,
    Started,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        Self::Error,
        Self::Failed,
        Self::Completed,
        Self::Created,
        Self::Attempted,
        Self::Cancelled,
        Self::Started,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Created => "created",
            Self::Attempted => "attempted",
            Self::Cancelled => "cancelled",
            Self::Started => "started",
        }
    }

    /// Fixed notification title for this kind.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Error => "Oops!",
            Self::Failed => "Task Failed",
            Self::Completed => "Task Completed",
            Self::Created => "Task Created",
            Self::Attempted => "Attempt Failed",
            Self::Cancelled => "Task Cancelled",
            Self::Started => "Task Started",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| Error::UnknownEvent {
                name: s.to_string(),
                suggestions: close_matches(s, Self::ALL.iter().map(EventKind::as_str)),
            })
    }
}

/// A detected transition of one operation, or a crash of the watcher itself.
#[derive(Debug, Clone)]
pub enum Event {
    Created(Operation),
    Started(Operation),
    Attempted(Operation),
    Failed(Operation),
    Completed(Operation),
    Cancelled(Operation),
    Error { time: DateTime<Utc> },
}

impl Event {
    /// The task-independent crash event.
    pub fn error() -> Self {
        Event::Error { time: Utc::now() }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Created(_) => EventKind::Created,
            Event::Started(_) => EventKind::Started,
            Event::Attempted(_) => EventKind::Attempted,
            Event::Failed(_) => EventKind::Failed,
            Event::Completed(_) => EventKind::Completed,
            Event::Cancelled(_) => EventKind::Cancelled,
            Event::Error { .. } => EventKind::Error,
        }
    }

    pub fn title(&self) -> &'static str {
        self.kind().title()
    }

    /// The operation this event concerns, if any.
    pub fn task(&self) -> Option<&Operation> {
        match self {
            Event::Created(op)
            | Event::Started(op)
            | Event::Attempted(op)
            | Event::Failed(op)
            | Event::Completed(op)
            | Event::Cancelled(op) => Some(op),
            Event::Error { .. } => None,
        }
    }

    /// When the transition was recorded.
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Event::Error { time } => *time,
            _ => self
                .task()
                .map(|op| op.metadata.update_time)
                .unwrap_or_else(Utc::now),
        }
    }

    /// True when the event's operation is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.task().is_some_and(Operation::done)
    }

    /// Render the human-readable message.
    pub fn message(&self) -> String {
        match self {
            Event::Created(op) => format!("Task '{}' was created.", op.description()),
            Event::Started(op) => {
                format!("Task '{}' has started processing.", op.description())
            }
            Event::Attempted(op) => format!(
                "Task '{}' attempt {} failed.",
                op.description(),
                op.metadata.attempt.saturating_sub(1)
            ),
            Event::Failed(op) => format!(
                "Task '{}' failed after {} with error '{}'.",
                op.description(),
                format_duration(op.time_elapsed()),
                op.error_message().unwrap_or("Unknown")
            ),
            Event::Completed(op) => {
                let mut message = format!(
                    "Task '{}' completed successfully! It ran for {}",
                    op.description(),
                    format_duration(op.time_elapsed())
                );
                if let Some(usage) = op.metadata.batch_eecu_usage_seconds {
                    message.push_str(&format!(" and used {usage:.2} EECU-seconds"));
                }
                message.push('.');
                message
            }
            Event::Cancelled(op) => format!("Task '{}' was cancelled.", op.description()),
            Event::Error { .. } => {
                "Something went wrong and taskwatch needs to be restarted.".to_string()
            }
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title(), self.message())
    }
}

#[derive(Serialize)]
struct EventRecord<'a> {
    #[serde(rename = "type")]
    kind: EventKind,
    title: &'static str,
    message: String,
    time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<&'a str>,
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EventRecord {
            kind: self.kind(),
            title: self.title(),
            message: self.message(),
            time: self.time(),
            task: self.task().map(|op| op.name.as_str()),
        }
        .serialize(serializer)
    }
}

/// Stable sort by event time; events recorded at the same instant keep
/// their detection order.
pub fn sort_events_by_time(events: &mut [Event]) {
    events.sort_by_key(Event::time);
}

/// Render a duration rounded to whole seconds.
pub fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds().max(0) as u64;
    humantime::format_duration(std::time::Duration::from_secs(secs)).to_string()
}

/// The set of event kinds eligible for notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchList(BTreeSet<EventKind>);

impl WatchList {
    pub fn new(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self(kinds.into_iter().collect())
    }

    pub fn all() -> Self {
        Self::new(EventKind::ALL)
    }

    /// Parse event names. `"all"` selects every kind; no names selects the
    /// default set.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, Error> {
        if names.is_empty() {
            return Ok(Self::default());
        }
        let mut kinds = BTreeSet::new();
        let mut all = false;
        for name in names {
            let name = name.as_ref();
            if name.trim().eq_ignore_ascii_case("all") {
                all = true;
            } else {
                kinds.insert(name.parse::<EventKind>()?);
            }
        }
        Ok(if all { Self::all() } else { Self(kinds) })
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.0.iter().copied()
    }
}

impl Default for WatchList {
    fn default() -> Self {
        Self::new([EventKind::Completed, EventKind::Failed, EventKind::Error])
    }
}

impl fmt::Display for WatchList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|k| k.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}
