//! Domain types for the task pool.
//!
//! All path fields use `PathBuf`. Every type round-trips through serde so the
//! config layer can persist it without an intermediate representation.

use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Caller-assigned group tag. Carries no ordering meaning of its own; the
/// execution order comes from a [`GroupOrder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for GroupId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for GroupId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Replicate `source` into `destination`, copying only what changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncTask {
    pub group_id: GroupId,
    #[serde(rename = "src", default)]
    pub source: PathBuf,
    #[serde(rename = "dst", default)]
    pub destination: PathBuf,
}

impl SyncTask {
    pub fn new(group_id: impl Into<GroupId>, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            group_id: group_id.into(),
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// A sync task with an empty source or destination does nothing.
    pub fn is_inert(&self) -> bool {
        self.source.as_os_str().is_empty() || self.destination.as_os_str().is_empty()
    }
}

/// Run `command_line` with `working_dir` as the current directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandTask {
    pub group_id: GroupId,
    /// Empty means the orchestrator's own working directory.
    #[serde(rename = "root", default)]
    pub working_dir: PathBuf,
    #[serde(rename = "cmd", default)]
    pub command_line: String,
    /// Display name shown in status events.
    #[serde(rename = "desc", default)]
    pub label: String,
}

impl CommandTask {
    pub fn new(
        group_id: impl Into<GroupId>,
        working_dir: impl Into<PathBuf>,
        command_line: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            working_dir: working_dir.into(),
            command_line: command_line.into(),
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn is_inert(&self) -> bool {
        self.command_line.trim().is_empty()
    }

    /// Label when set, otherwise the command line itself.
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            self.command_line.trim()
        } else {
            self.label.trim()
        }
    }
}

/// One entry of the task pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Task {
    #[serde(rename = "SYNC")]
    Sync(SyncTask),
    #[serde(rename = "CMD")]
    Command(CommandTask),
}

impl Task {
    pub fn group_id(&self) -> GroupId {
        match self {
            Task::Sync(t) => t.group_id,
            Task::Command(t) => t.group_id,
        }
    }

    /// Missing required fields make a task a no-op rather than an error.
    pub fn is_inert(&self) -> bool {
        match self {
            Task::Sync(t) => t.is_inert(),
            Task::Command(t) => t.is_inert(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Task::Sync(_) => "sync",
            Task::Command(_) => "command",
        }
    }

    /// Whether this task belongs to the group named by an order token.
    ///
    /// Matching is textual: token `"01"` does not select group `1`.
    pub fn in_group(&self, token: &str) -> bool {
        self.group_id().to_string() == token
    }
}

impl From<SyncTask> for Task {
    fn from(t: SyncTask) -> Self {
        Task::Sync(t)
    }
}

impl From<CommandTask> for Task {
    fn from(t: CommandTask) -> Self {
        Task::Command(t)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Sync(t) => write!(
                f,
                "[{}] sync {} -> {}",
                t.group_id,
                t.source.display(),
                t.destination.display()
            ),
            Task::Command(t) => write!(f, "[{}] cmd {}", t.group_id, t.display_name()),
        }
    }
}

// ---------------------------------------------------------------------------
// Group order
// ---------------------------------------------------------------------------

/// Operator-chosen sequence of group tokens.
///
/// Parsed from a comma-delimited string. Tokens are trimmed and empty tokens
/// dropped; repeats are kept, so a group listed twice runs twice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupOrder(Vec<String>);

impl GroupOrder {
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromStr for GroupOrder {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for GroupOrder {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for GroupOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
