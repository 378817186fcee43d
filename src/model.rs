use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Lifecycle state of a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    Pending,
    Running,
    Cancelling,
    Succeeded,
    Failed,
    Cancelled,
    /// Any state string this build does not recognize.
    Unknown,
}

impl OperationState {
    pub const ACTIVE: [OperationState; 3] = [Self::Pending, Self::Running, Self::Cancelling];
    pub const TERMINAL: [OperationState; 3] = [Self::Succeeded, Self::Failed, Self::Cancelled];

    /// Decode a wire value, falling back to `Unknown` instead of failing.
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "CANCELLING" => Self::Cancelling,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Cancelling => "CANCELLING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }
}

impl<'de> Deserialize<'de> for OperationState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of work an operation performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    ExportFeatures,
    ExportImage,
    ExportVideo,
    ExportTiles,
    ExportClassifier,
    IngestImage,
    IngestTable,
    #[default]
    Unknown,
}

impl OperationType {
    /// Decode a wire value, falling back to `Unknown` instead of failing.
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "EXPORT_FEATURES" => Self::ExportFeatures,
            "EXPORT_IMAGE" => Self::ExportImage,
            "EXPORT_VIDEO" => Self::ExportVideo,
            "EXPORT_TILES" => Self::ExportTiles,
            "EXPORT_CLASSIFIER" => Self::ExportClassifier,
            "INGEST_IMAGE" => Self::IngestImage,
            "INGEST_TABLE" => Self::IngestTable,
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for OperationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// A stage reported by a running operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationStage {
    pub display_name: String,
    #[serde(default)]
    pub total_work_units: Option<f64>,
    #[serde(default)]
    pub complete_work_units: Option<f64>,
    #[serde(default)]
    pub description: String,
}

/// Error detail attached to a failed or cancelled operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationError {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Metadata describing the current state of an operation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetadata {
    pub state: OperationState,
    #[serde(rename = "type", default)]
    pub op_type: OperationType,
    pub description: String,
    #[serde(deserialize_with = "de_timestamp")]
    #[schemars(with = "String")]
    pub create_time: DateTime<Utc>,
    #[serde(deserialize_with = "de_timestamp")]
    #[schemars(with = "String")]
    pub update_time: DateTime<Utc>,
    /// Absent, or the epoch, while the operation has not started.
    #[serde(default, deserialize_with = "de_opt_timestamp", skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_timestamp", skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_attempt")]
    pub attempt: u32,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<OperationStage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_uris: Option<Vec<String>>,
    /// Compute usage reported once the operation has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_eecu_usage_seconds: Option<f64>,
}

fn default_attempt() -> u32 {
    1
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTime {
    Millis(i64),
    Text(String),
}

impl WireTime {
    fn into_datetime(self) -> std::result::Result<DateTime<Utc>, String> {
        match self {
            WireTime::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| format!("timestamp out of range: {ms}")),
            WireTime::Text(text) => {
                if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
                    return Ok(dt.with_timezone(&Utc));
                }
                text.trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(DateTime::from_timestamp_millis)
                    .ok_or_else(|| format!("invalid timestamp '{text}'"))
            }
        }
    }
}

/// Accepts RFC 3339 strings and milliseconds since the epoch (number or string).
fn de_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<DateTime<Utc>, D::Error> {
    WireTime::deserialize(deserializer)?
        .into_datetime()
        .map_err(D::Error::custom)
}

fn de_opt_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
    Option::<WireTime>::deserialize(deserializer)?
        .map(WireTime::into_datetime)
        .transpose()
        .map_err(D::Error::custom)
}

/// One remote asynchronous operation as of a single poll.
///
/// Two operations are equal when their names match, whatever their metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Operation {
    /// Unique, stable identifier of the operation.
    pub name: String,
    pub metadata: OperationMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl Operation {
    /// Parse one raw record from an operation source.
    pub fn from_record(record: serde_json::Value) -> Result<Self> {
        serde_json::from_value(record).map_err(Error::InvalidRecord)
    }

    pub fn state(&self) -> OperationState {
        self.metadata.state
    }

    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    /// True once the operation reached a terminal state.
    pub fn done(&self) -> bool {
        self.metadata.state.is_terminal()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.message.as_deref())
    }

    /// Time between creation and the latest update.
    pub fn time_elapsed(&self) -> Duration {
        (self.metadata.update_time - self.metadata.create_time).max(Duration::zero())
    }

    /// Time spent running; zero when the operation never started.
    pub fn runtime(&self) -> Duration {
        match self.metadata.start_time {
            Some(start) if start > DateTime::UNIX_EPOCH => {
                (self.metadata.update_time - start).max(Duration::zero())
            }
            _ => Duration::zero(),
        }
    }

    /// Copy of this operation with a different state.
    pub fn with_state(&self, state: OperationState) -> Self {
        let mut copy = self.clone();
        copy.metadata.state = state;
        copy
    }

    /// Display order: unfinished before done, newest first, then by name.
    pub fn cmp_display(&self, other: &Self) -> Ordering {
        self.done()
            .cmp(&other.done())
            .then_with(|| other.metadata.create_time.cmp(&self.metadata.create_time))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Operation {}

/// Sort operations in display order.
pub fn sort_operations(ops: &mut [Operation]) {
    ops.sort_by(Operation::cmp_display);
}

/// Generate JSON Schema for an operation record.
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(Operation);
    serde_json::to_string_pretty(&schema).expect("failed to serialize schema")
}
