use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the watcher library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A notifier name that is not in the registry.
    #[error("unknown notifier '{name}'{}", did_you_mean(suggestions))]
    UnknownNotifier {
        name: String,
        suggestions: Vec<String>,
    },

    /// An event name that is not a known event kind.
    #[error("unknown event '{name}'{}", did_you_mean(suggestions))]
    UnknownEvent {
        name: String,
        suggestions: Vec<String>,
    },

    /// A record that could not be turned into an operation.
    #[error("malformed operation record: {0}")]
    InvalidRecord(#[source] serde_json::Error),

    /// The operation source failed to produce records.
    #[error("failed to fetch operations: {0}")]
    Fetch(String),

    /// A notifier failed to deliver.
    #[error("notifier '{notifier}' failed: {message}")]
    Notify { notifier: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether the error stems from setup rather than from a poll cycle.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::UnknownNotifier { .. }
                | Error::UnknownEvent { .. }
                | Error::Config(_)
                | Error::ConfigFile { .. }
                | Error::ConfigParse { .. }
        )
    }
}

fn did_you_mean(suggestions: &[String]) -> String {
    match suggestions {
        [] => String::new(),
        [one] => format!(", did you mean '{one}'?"),
        many => format!(", did you mean one of: {}?", many.join(", ")),
    }
}
