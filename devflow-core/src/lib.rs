//! Core library for developer-workflow command execution.

pub mod clean;
pub mod config;
pub mod debounce;
pub mod error;
pub mod ignore;
pub mod job;
pub mod pipeline;
pub mod process;
pub mod watch_runner;
pub mod watcher;

pub use clean::clean_paths;
pub use config::{resolve_command, ProjectConfig, Verb};
pub use debounce::Debouncer;
pub use error::{Error, Result};
pub use ignore::IgnoreSet;
pub use job::{CommandSet, Job};
pub use pipeline::{CommandPipeline, ExitPolicy, PipelineEvent, PipelineOutcome};
pub use process::{ProcessEvent, ProcessHandle, ShellSpawner, Spawner};
pub use watch_runner::{WatchEvent, WatchOptions, WatchRunner, WatchState};
pub use watcher::{ChangeEvent, FileWatcher};
