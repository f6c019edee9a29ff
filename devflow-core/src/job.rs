//! Job data models.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One or more shell commands as written in configuration.
///
/// Accepts either a single string or an array of strings in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSet {
    Single(String),
    List(Vec<String>),
}

impl CommandSet {
    pub fn commands(&self) -> Vec<String> {
        match self {
            CommandSet::Single(command) => vec![command.clone()],
            CommandSet::List(commands) => commands.clone(),
        }
    }

    /// Returns `true` when there is no non-blank command to run.
    pub fn is_empty(&self) -> bool {
        match self {
            CommandSet::Single(command) => command.trim().is_empty(),
            CommandSet::List(commands) => commands.iter().all(|c| c.trim().is_empty()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CommandSet::Single(_) => 1,
            CommandSet::List(commands) => commands.len(),
        }
    }
}

impl From<&str> for CommandSet {
    fn from(command: &str) -> Self {
        CommandSet::Single(command.to_string())
    }
}

impl From<String> for CommandSet {
    fn from(command: String) -> Self {
        CommandSet::Single(command)
    }
}

impl From<Vec<String>> for CommandSet {
    fn from(commands: Vec<String>) -> Self {
        if commands.len() == 1 {
            CommandSet::Single(commands.into_iter().next().unwrap_or_default())
        } else {
            CommandSet::List(commands)
        }
    }
}

/// An ordered group of shell commands submitted as one execution request.
///
/// Runners only borrow a `Job`, so it cannot change once a run has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    commands: Vec<String>,
    cwd: Option<PathBuf>,
}

impl Job {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    pub fn from_set(set: &CommandSet) -> Self {
        Self::new(set.commands())
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[inline]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    #[inline]
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
