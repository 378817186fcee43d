use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Something that lists the current operations as raw records.
pub trait OperationSource {
    fn fetch(&mut self) -> Result<Vec<Value>>;
}

impl<F> OperationSource for F
where
    F: FnMut() -> Result<Vec<Value>>,
{
    fn fetch(&mut self) -> Result<Vec<Value>> {
        self()
    }
}

/// The source selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredSource {
    File(JsonFileSource),
    Command(CommandSource),
}

impl OperationSource for ConfiguredSource {
    fn fetch(&mut self) -> Result<Vec<Value>> {
        match self {
            ConfiguredSource::File(source) => source.fetch(),
            ConfiguredSource::Command(source) => source.fetch(),
        }
    }
}

/// Re-reads a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OperationSource for JsonFileSource {
    fn fetch(&mut self) -> Result<Vec<Value>> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Fetch(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let records = parse_listing(&text)?;
        debug!(path = %self.path.display(), count = records.len(), "read operation listing");
        Ok(records)
    }
}

/// Runs a shell command whose stdout is the operation listing.
#[derive(Debug, Clone)]
pub struct CommandSource {
    command: String,
}

impl CommandSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn shell(&self) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.command);
            cmd
        }
    }
}

impl OperationSource for CommandSource {
    fn fetch(&mut self) -> Result<Vec<Value>> {
        let output = self
            .shell()
            .output()
            .map_err(|e| Error::Fetch(format!("cannot run '{}': {e}", self.command)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Fetch(format!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        let records = parse_listing(&String::from_utf8_lossy(&output.stdout))?;
        debug!(command = %self.command, count = records.len(), "ran operation listing command");
        Ok(records)
    }
}

/// Accepts either a bare array of records or an object with an
/// `operations` array.
fn parse_listing(text: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(records) => Ok(records),
        Value::Object(mut map) => match map.remove("operations") {
            Some(Value::Array(records)) => Ok(records),
            None => Ok(Vec::new()),
            Some(_) => Err(Error::Fetch("'operations' is not an array".into())),
        },
        _ => Err(Error::Fetch(
            "operation listing must be a JSON array or object".into(),
        )),
    }
}
