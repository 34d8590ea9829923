//! Command specs and immutable command sequences.
//!
//! Sequences come from plain text (one command per line, `#` comments and
//! blank lines skipped) or YAML (a list of bare strings or maps carrying
//! explicit wait hints):
//!
//! ```yaml
//! - show ip interface brief
//! - command: crypto key generate rsa modulus 2048
//!   confirm: true
//!   extended_timeout: 60
//! ```

use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Commands that prompt before replacing state and then run for a while.
const LONG_RUNNING_PREFIXES: &[&str] = &["crypto key generate"];

/// Keywords whose following word is a credential.
const SECRET_KEYWORDS: &[&str] = &["secret", "password"];

/// How long to wait for a command, when the defaults don't fit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitHint {
    /// Base timeout, before the delay factor. Written in seconds.
    #[serde(default, with = "seconds", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// The command may ask a yes/no question and then run long.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub confirm: bool,

    /// Base window after a confirmation is answered. Written in seconds.
    #[serde(
        default,
        rename = "extended_timeout",
        with = "seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub extended: Option<Duration>,
}

impl WaitHint {
    /// Hint for a command that confirms and then runs long.
    pub fn long_running() -> Self {
        Self {
            confirm: true,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn extended(&self) -> Option<Duration> {
        self.extended
    }
}

/// Durations as (possibly fractional) seconds.
mod seconds {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(d) if d.subsec_nanos() == 0 => serializer.serialize_u64(d.as_secs()),
            Some(d) => serializer.serialize_f64(d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}

/// One command line plus its wait hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,

    #[serde(flatten)]
    pub hint: WaitHint,
}

impl CommandSpec {
    /// Create a spec, attaching the long-running hint where it applies.
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let hint = if is_long_running(&command) {
            WaitHint::long_running()
        } else {
            WaitHint::default()
        };
        Self { command, hint }
    }

    pub fn with_hint(mut self, hint: WaitHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.hint.timeout = Some(timeout);
        self
    }
}

/// `command` with credentials masked, for logs and reports.
///
/// The word after `secret` or `password` becomes `*****`, skipping an
/// IOS encryption type digit (`secret 5 $1$...`).
pub fn redact(command: &str) -> Cow<'_, str> {
    let words: Vec<&str> = command.split_whitespace().collect();
    if !words.iter().any(|w| SECRET_KEYWORDS.contains(w)) {
        return Cow::Borrowed(command);
    }

    let mut out = Vec::with_capacity(words.len());
    let mut mask = false;
    for word in words {
        if mask {
            if word.len() == 1 && word.chars().all(|c| c.is_ascii_digit()) {
                out.push(word);
                continue;
            }
            out.push("*****");
            mask = false;
        } else {
            out.push(word);
            mask = SECRET_KEYWORDS.contains(&word);
        }
    }
    let indent = &command[..command.len() - command.trim_start().len()];
    Cow::Owned(format!("{}{}", indent, out.join(" ")))
}

fn is_long_running(command: &str) -> bool {
    let command = command.trim_start();
    LONG_RUNNING_PREFIXES
        .iter()
        .any(|prefix| command.starts_with(prefix))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YamlEntry {
    Plain(String),
    Full(CommandSpec),
}

/// Ordered, immutable list of commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSequence {
    commands: Vec<CommandSpec>,
}

impl CommandSequence {
    pub fn new(commands: Vec<CommandSpec>) -> Self {
        Self { commands }
    }

    /// Build from bare command lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(lines.into_iter().map(CommandSpec::new).collect())
    }

    /// Parse the plain-text format.
    pub fn from_text(text: &str) -> Self {
        Self::from_lines(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Parse the YAML format.
    ///
    /// Entries without explicit hints get the same automatic hints as
    /// plain-text commands.
    pub fn from_yaml(text: &str) -> std::result::Result<Self, StoreError> {
        let entries: Vec<YamlEntry> = serde_yaml::from_str(text)?;
        let commands = entries
            .into_iter()
            .map(|entry| match entry {
                YamlEntry::Plain(command) => CommandSpec::new(command),
                YamlEntry::Full(spec) if spec.hint == WaitHint::default() => {
                    CommandSpec::new(spec.command)
                }
                YamlEntry::Full(spec) => spec,
            })
            .collect();
        Ok(Self::new(commands))
    }

    /// Load a file, choosing the format by extension.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::io(path, e))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(Self::from_yaml(&text)?),
            _ => Ok(Self::from_text(&text)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter()
    }

    pub fn as_slice(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl IntoIterator for CommandSequence {
    type Item = CommandSpec;
    type IntoIter = std::vec::IntoIter<CommandSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

impl<'a> IntoIterator for &'a CommandSequence {
    type Item = &'a CommandSpec;
    type IntoIter = std::slice::Iter<'a, CommandSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
