//! Notification transports and the fan-out that drives them.

use std::process::Command;

use serde_json::json;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::suggest::close_matches;

/// A delivery mechanism for notifications.
pub trait Notifier {
    fn name(&self) -> &str;
    fn send(&self, title: &str, message: &str) -> Result<()>;
}

type Constructor = fn(&Config) -> Result<Box<dyn Notifier>>;

/// Every notifier that can be selected by name.
pub const NOTIFIERS: &[(&str, Constructor)] = &[
    ("native", NativeNotifier::boxed),
    ("pushbullet", PushbulletNotifier::boxed),
    ("log", LogNotifier::boxed),
];

pub fn notifier_names() -> impl Iterator<Item = &'static str> {
    NOTIFIERS.iter().map(|(name, _)| *name)
}

/// Check notifier names and expand `"all"`, without constructing anything.
///
/// Names are matched case-insensitively and duplicates are dropped, keeping
/// the first occurrence. Every name is checked even when `"all"` is present.
pub fn expand_notifier_names<S: AsRef<str>>(names: &[S]) -> Result<Vec<&'static str>> {
    let mut resolved: Vec<&'static str> = Vec::new();
    let mut all = false;
    for name in names {
        let name = name.as_ref();
        if name.trim().eq_ignore_ascii_case("all") {
            all = true;
            continue;
        }
        let known = notifier_names()
            .find(|known| known.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| Error::UnknownNotifier {
                name: name.to_string(),
                suggestions: close_matches(name, notifier_names()),
            })?;
        if !resolved.contains(&known) {
            resolved.push(known);
        }
    }
    if all {
        resolved = notifier_names().collect();
    }
    Ok(resolved)
}

/// Construct the notifiers named in `names`.
pub fn resolve_notifiers<S: AsRef<str>>(
    names: &[S],
    config: &Config,
) -> Result<Vec<Box<dyn Notifier>>> {
    expand_notifier_names(names)?
        .into_iter()
        .map(|name| {
            let (_, construct) = NOTIFIERS
                .iter()
                .find(|(known, _)| *known == name)
                .ok_or_else(|| Error::Config(format!("notifier '{name}' is not registered")))?;
            debug!(notifier = name, "initializing notifier");
            construct(config)
        })
        .collect()
}

/// Delivers each notification to every registered notifier, in order.
///
/// The first failing notifier aborts delivery and its error is returned
/// unchanged; there is no retry.
#[derive(Default)]
pub struct Dispatcher {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn from_names<S: AsRef<str>>(names: &[S], config: &Config) -> Result<Self> {
        Ok(Self::new(resolve_notifiers(names, config)?))
    }

    pub fn notify(&self, title: &str, message: &str) -> Result<()> {
        for notifier in &self.notifiers {
            notifier.send(title, message)?;
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

/// Desktop notifications through the platform's notification tool.
pub struct NativeNotifier;

impl NativeNotifier {
    fn boxed(_config: &Config) -> Result<Box<dyn Notifier>> {
        Ok(Box::new(NativeNotifier))
    }

    fn command(title: &str, message: &str) -> Command {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                escape_applescript(message),
                escape_applescript(title)
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            cmd
        } else {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--app-name=taskwatch").arg(title).arg(message);
            cmd
        }
    }
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Notifier for NativeNotifier {
    fn name(&self) -> &str {
        "native"
    }

    fn send(&self, title: &str, message: &str) -> Result<()> {
        let status = Self::command(title, message)
            .status()
            .map_err(|e| Error::Notify {
                notifier: self.name().to_string(),
                message: e.to_string(),
            })?;
        if !status.success() {
            return Err(Error::Notify {
                notifier: self.name().to_string(),
                message: format!("notification command exited with {status}"),
            });
        }
        Ok(())
    }
}

const PUSHBULLET_URL: &str = "https://api.pushbullet.com/v2/pushes";

/// Push notes through the Pushbullet API.
pub struct PushbulletNotifier {
    client: reqwest::blocking::Client,
    api_key: String,
}

impl PushbulletNotifier {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key: api_key.into(),
        }
    }

    fn boxed(config: &Config) -> Result<Box<dyn Notifier>> {
        let api_key = config.pushbullet_api_key().ok_or_else(|| {
            Error::Config(
                "the pushbullet notifier needs an API key: set [pushbullet] api_key \
                 in the config file or PUSHBULLET_API_KEY"
                    .into(),
            )
        })?;
        Ok(Box::new(Self::new(api_key)))
    }
}

impl Notifier for PushbulletNotifier {
    fn name(&self) -> &str {
        "pushbullet"
    }

    fn send(&self, title: &str, message: &str) -> Result<()> {
        let response = self
            .client
            .post(PUSHBULLET_URL)
            .header("Access-Token", &self.api_key)
            .json(&json!({ "type": "note", "title": title, "body": message }))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Notify {
                notifier: self.name().to_string(),
                message: format!("push rejected with {status}"),
            });
        }
        Ok(())
    }
}

/// Writes notifications to the log.
pub struct LogNotifier;

impl LogNotifier {
    fn boxed(_config: &Config) -> Result<Box<dyn Notifier>> {
        Ok(Box::new(LogNotifier))
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn send(&self, title: &str, message: &str) -> Result<()> {
        info!(target: "taskwatch::notify", title, "{message}");
        Ok(())
    }
}
