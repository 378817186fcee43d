use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::source::{CommandSource, ConfiguredSource, JsonFileSource};

const CONFIG_ENV: &str = "TASKWATCH_CONFIG";
const PUSHBULLET_KEY_ENV: &str = "PUSHBULLET_API_KEY";
pub const DEFAULT_INTERVAL_MINS: f64 = 5.0;

/// Settings read from the optional TOML config file.
///
/// Every field may be overridden from the command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Minutes between polls.
    pub interval_mins: Option<f64>,
    /// Notifier names, `"all"` allowed.
    pub notifiers: Option<Vec<String>>,
    /// Event names to notify for, `"all"` allowed.
    pub watch_for: Option<Vec<String>>,
    pub source: SourceConfig,
    pub pushbullet: PushbulletConfig,
}

/// Where operation listings come from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// JSON file re-read on every poll.
    pub file: Option<PathBuf>,
    /// Shell command printing the listing as JSON.
    pub command: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushbulletConfig {
    pub api_key: Option<String>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path (argument or `TASKWATCH_CONFIG`) must exist; the
    /// default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match explicit {
            Some(path) => Self::from_file(&path),
            None => match default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Poll interval, validated. `cli` takes precedence over the file.
    pub fn interval(&self, cli: Option<f64>) -> Result<std::time::Duration> {
        let mins = cli.or(self.interval_mins).unwrap_or(DEFAULT_INTERVAL_MINS);
        if !mins.is_finite() || mins <= 0.0 {
            return Err(Error::Config(format!(
                "interval must be a positive number of minutes, got {mins}"
            )));
        }
        Ok(std::time::Duration::from_secs_f64(mins * 60.0))
    }

    /// Notifier names; CLI names win when any are given.
    pub fn notifier_names(&self, cli: &[String]) -> Vec<String> {
        if !cli.is_empty() {
            return cli.to_vec();
        }
        self.notifiers
            .clone()
            .unwrap_or_else(|| vec!["native".to_string()])
    }

    /// Watched event names; CLI names win when any are given.
    pub fn watch_names(&self, cli: &[String]) -> Vec<String> {
        if !cli.is_empty() {
            return cli.to_vec();
        }
        self.watch_for.clone().unwrap_or_default()
    }

    /// Build the operation source, letting CLI flags replace the file's.
    pub fn source(
        &self,
        cli_file: Option<&Path>,
        cli_command: Option<&str>,
    ) -> Result<ConfiguredSource> {
        let (file, command) = if cli_file.is_some() || cli_command.is_some() {
            (cli_file.map(Path::to_path_buf), cli_command.map(str::to_string))
        } else {
            (self.source.file.clone(), self.source.command.clone())
        };
        match (file, command) {
            (Some(file), None) => Ok(ConfiguredSource::File(JsonFileSource::new(file))),
            (None, Some(command)) => Ok(ConfiguredSource::Command(CommandSource::new(command))),
            (Some(_), Some(_)) => Err(Error::Config(
                "choose either a source file or a source command, not both".into(),
            )),
            (None, None) => Err(Error::Config(
                "no operation source: pass --source-file or --source-cmd, \
                 or set [source] in the config file"
                    .into(),
            )),
        }
    }

    pub fn pushbullet_api_key(&self) -> Option<String> {
        self.pushbullet
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(PUSHBULLET_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// `<config dir>/taskwatch/config.toml`, when a config dir exists.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskwatch").join("config.toml"))
}
