//! Snapshot diffing: pair each freshly fetched operation with its
//! predecessor and classify the transition into at most one event.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::Result;
use crate::events::Event;
use crate::model::{self, Operation, OperationState};

/// Result of comparing a snapshot against newly fetched records.
#[derive(Debug, Clone)]
pub struct Diff {
    /// The new snapshot in display order.
    pub tasks: Vec<Operation>,
    /// Unfinished operations missing from the records, carried over as-is.
    pub missing: usize,
    /// Events in the order their operations appeared in the records.
    pub events: Vec<Event>,
}

/// Parse `records` and compare them against `previous`.
///
/// A record that fails to parse aborts the whole diff; `previous` is only
/// borrowed, so the caller's snapshot is untouched in that case. Unfinished
/// operations that vanished from the listing stay in the snapshot unchanged
/// and produce no event; finished ones are dropped.
pub fn diff(previous: &[Operation], records: Vec<Value>) -> Result<Diff> {
    let mut tasks = records
        .into_iter()
        .map(Operation::from_record)
        .collect::<Result<Vec<_>>>()?;

    let by_name: HashMap<&str, &Operation> =
        previous.iter().map(|op| (op.name.as_str(), op)).collect();

    let events = tasks
        .iter()
        .filter_map(|op| classify(by_name.get(op.name.as_str()).copied(), op))
        .collect();

    let seen: HashSet<&str> = tasks.iter().map(|op| op.name.as_str()).collect();
    let stale: Vec<Operation> = previous
        .iter()
        .filter(|op| !op.done() && !seen.contains(op.name.as_str()))
        .cloned()
        .collect();
    let missing = stale.len();
    tasks.extend(stale);

    model::sort_operations(&mut tasks);
    Ok(Diff {
        tasks,
        events,
        missing,
    })
}

/// Classify the transition from `prev` to `curr`.
///
/// An operation seen for the first time is compared against a copy of
/// itself in the pending state, so one that shows up already finished still
/// yields its terminal event. A state change wins over an attempt change.
pub fn classify(prev: Option<&Operation>, curr: &Operation) -> Option<Event> {
    let synthetic;
    let prev = match prev {
        Some(prev) => prev,
        None if curr.state() == OperationState::Pending => {
            return Some(Event::Created(curr.clone()));
        }
        None => {
            synthetic = curr.with_state(OperationState::Pending);
            &synthetic
        }
    };

    if prev.state() != curr.state() {
        let task = curr.clone();
        return match curr.state() {
            OperationState::Running => Some(Event::Started(task)),
            OperationState::Succeeded => Some(Event::Completed(task)),
            OperationState::Failed => Some(Event::Failed(task)),
            OperationState::Cancelled => Some(Event::Cancelled(task)),
            _ => None,
        };
    }

    if prev.metadata.attempt != curr.metadata.attempt {
        return Some(Event::Attempted(curr.clone()));
    }

    None
}
