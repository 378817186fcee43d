//! Record builders shared by unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::model::Operation;
use crate::notifiers::Notifier;

fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub(crate) struct RecordBuilder {
    name: String,
    state: String,
    description: String,
    created_min: i64,
    updated_min: i64,
    attempt: u32,
    error: Option<String>,
    usage: Option<f64>,
}

/// A record created at the base time and last updated ten minutes later.
pub(crate) fn record(name: &str, state: &str) -> RecordBuilder {
    RecordBuilder {
        name: name.to_string(),
        state: state.to_string(),
        description: name.to_string(),
        created_min: 0,
        updated_min: 10,
        attempt: 1,
        error: None,
        usage: None,
    }
}

impl RecordBuilder {
    pub(crate) fn created(mut self, minutes: i64) -> Self {
        self.updated_min = minutes + (self.updated_min - self.created_min);
        self.created_min = minutes;
        self
    }

    pub(crate) fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub(crate) fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub(crate) fn error(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }

    pub(crate) fn usage(mut self, seconds: f64) -> Self {
        self.usage = Some(seconds);
        self
    }

    pub(crate) fn build(self) -> Value {
        let created = base_time() + Duration::minutes(self.created_min);
        let updated = base_time() + Duration::minutes(self.updated_min);
        let mut metadata = json!({
            "state": self.state,
            "type": "EXPORT_IMAGE",
            "description": self.description,
            "createTime": created.to_rfc3339(),
            "updateTime": updated.to_rfc3339(),
            "attempt": self.attempt,
        });
        if self.state != "PENDING" {
            metadata["startTime"] = json!((created + Duration::minutes(1)).to_rfc3339());
        }
        if let Some(usage) = self.usage {
            metadata["batchEecuUsageSeconds"] = json!(usage);
        }
        let mut value = json!({ "name": self.name, "metadata": metadata });
        if let Some(message) = self.error {
            value["error"] = json!({ "code": 3, "message": message });
        }
        value
    }

    pub(crate) fn op(self) -> Operation {
        Operation::from_record(self.build()).unwrap()
    }
}

type SentLog = Rc<RefCell<Vec<(String, String, String)>>>;

/// Notifier that records every delivery into a shared log.
pub(crate) struct RecordingNotifier {
    name: String,
    log: SentLog,
}

impl RecordingNotifier {
    pub(crate) fn new(name: &str) -> (Self, SentLog) {
        let log = SentLog::default();
        let notifier = Self {
            name: name.to_string(),
            log: Rc::clone(&log),
        };
        (notifier, log)
    }

    /// Another notifier writing into the same log.
    pub(crate) fn sibling(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            log: Rc::clone(&self.log),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, title: &str, message: &str) -> Result<()> {
        self.log
            .borrow_mut()
            .push((self.name.clone(), title.to_string(), message.to_string()));
        Ok(())
    }
}

/// Notifier whose every delivery fails.
pub(crate) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn name(&self) -> &str {
        "failing"
    }

    fn send(&self, _title: &str, _message: &str) -> Result<()> {
        Err(Error::Notify {
            notifier: "failing".into(),
            message: "unreachable".into(),
        })
    }
}
