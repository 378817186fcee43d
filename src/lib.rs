//! Poll long-running batch operations, detect state transitions between
//! polls, and send notifications for the kinds of events you care about.
//!
//! The pieces, leaves first: [`model`] parses operation records, [`events`]
//! defines what can happen to an operation, [`diff`] turns two snapshots into
//! events, [`watcher`] runs the fetch/diff/dispatch cycle, and [`notifiers`]
//! delivers the result.

pub mod cli;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod logging;
pub mod model;
pub mod notifiers;
pub mod reporter;
pub mod schedule;
pub mod source;
pub mod suggest;
pub mod watcher;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{Error, Result};
