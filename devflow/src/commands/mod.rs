//! Command implementations for the CLI.

mod clean;
mod pipeline;
mod watch;

use std::path::Path;

use anyhow::{Context, Result};
use devflow_core::{CommandSet, ProjectConfig};

pub use clean::cmd_clean;
pub use pipeline::{cmd_pipeline, cmd_release, cmd_run};
pub use watch::cmd_watch;

fn load_config(dir: &Path) -> Result<ProjectConfig> {
    ProjectConfig::load(dir).with_context(|| format!("Failed to load config from {}", dir.display()))
}

/// Commands given on the command line, if any.
fn requested(commands: Vec<String>) -> Option<CommandSet> {
    if commands.is_empty() {
        None
    } else {
        Some(commands.into())
    }
}

fn create_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))
}
