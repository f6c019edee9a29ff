//! Project configuration from `devflow.toml`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::job::CommandSet;

pub const CONFIG_FILE: &str = "devflow.toml";
pub const DEFAULT_PACKAGE_MANAGER: &str = "npm";

/// Workflow verbs that map onto configurable commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Build,
    Test,
    Install,
    Release,
    Watch,
}

impl Verb {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Build => "build",
            Verb::Test => "test",
            Verb::Install => "install",
            Verb::Release => "release",
            Verb::Watch => "watch",
        }
    }

    /// Command used when neither the caller nor the project file gives one.
    ///
    /// `watch` has no sensible default and must always be configured.
    pub fn builtin_default(&self, package_manager: &str) -> Option<CommandSet> {
        match self {
            Verb::Build => Some(format!("{} run build", package_manager).into()),
            Verb::Test => Some(format!("{} test", package_manager).into()),
            Verb::Install => Some(format!("{} install", package_manager).into()),
            Verb::Release => Some("git push --follow-tags".into()),
            Verb::Watch => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watch settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchSection {
    /// Directory to watch, relative to the project directory.
    pub path: Option<PathBuf>,
    /// Extra ignore patterns, merged with the VCS defaults.
    #[serde(default)]
    pub ignore: Vec<String>,
    pub debounce_ms: Option<u64>,
}

/// Paths removed by `clean`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanSection {
    #[serde(default = "default_clean_paths")]
    pub paths: Vec<PathBuf>,
}

impl Default for CleanSection {
    fn default() -> Self {
        Self {
            paths: default_clean_paths(),
        }
    }
}

fn default_clean_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("dist")]
}

/// Project configuration as defined in `devflow.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub package_manager: Option<String>,
    #[serde(default)]
    pub commands: HashMap<String, CommandSet>,
    #[serde(default)]
    pub watch: WatchSection,
    #[serde(default)]
    pub clean: CleanSection,
    /// Directory the file was loaded from.
    #[serde(skip)]
    pub project_dir: Option<PathBuf>,
}

impl ProjectConfig {
    /// Loads `devflow.toml` from `dir`, or defaults when the file is absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            debug!(path = %path.display(), "no project config, using defaults");
            return Ok(Self {
                project_dir: Some(dir.to_path_buf()),
                ..Self::default()
            });
        }

        let content = std::fs::read_to_string(&path)?;
        let mut config = Self::parse(&content).map_err(|e| match e {
            Error::Toml { error, .. } => Error::Toml {
                error,
                context: path.display().to_string(),
            },
            other => other,
        })?;
        config.project_dir = Some(dir.to_path_buf());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        for (verb, commands) in &config.commands {
            if commands.is_empty() {
                return Err(Error::Configuration(format!(
                    "Command for '{}' in {} is empty",
                    verb, CONFIG_FILE
                )));
            }
        }
        Ok(config)
    }

    pub fn package_manager(&self) -> &str {
        self.package_manager
            .as_deref()
            .unwrap_or(DEFAULT_PACKAGE_MANAGER)
    }

    /// The persisted command for `verb`, if any.
    pub fn command(&self, verb: Verb) -> Option<&CommandSet> {
        self.commands.get(verb.as_str())
    }

    /// Resolves the command for `verb`: `requested`, then this file, then
    /// the built-in default.
    pub fn resolve(&self, verb: Verb, requested: Option<CommandSet>) -> Option<CommandSet> {
        resolve_command(
            requested,
            self.command(verb).cloned(),
            verb.builtin_default(self.package_manager()),
        )
    }
}

/// Picks the first available command: call-site override, persisted value,
/// built-in default. Blank sets count as absent.
pub fn resolve_command(
    requested: Option<CommandSet>,
    persisted: Option<CommandSet>,
    builtin: Option<CommandSet>,
) -> Option<CommandSet> {
    [requested, persisted, builtin]
        .into_iter()
        .flatten()
        .find(|set| !set.is_empty())
}
