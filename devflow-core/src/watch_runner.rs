//! Debounced re-execution of a job whenever a watched tree changes.
//!
//! Each watch cycle kills every process left over from the previous cycle and
//! waits for it to exit before anything new is spawned. The commands of one
//! cycle run side by side with no ordering between them, and a failing
//! command never stops the watch loop.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::debounce::{Debouncer, DEFAULT_DEBOUNCE};
use crate::error::{Error, Result};
use crate::ignore::IgnoreSet;
use crate::job::CommandSet;
use crate::process::{ProcessEvent, ProcessHandle, Spawner};
use crate::watcher::{ChangeEvent, FileWatcher};

/// Settings for a [`WatchRunner`].
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Command(s) started on every cycle. Required.
    pub command: Option<CommandSet>,
    /// Tree to watch; defaults to `context`. Relative paths are taken from
    /// `context`.
    pub path: Option<PathBuf>,
    /// Working directory for spawned commands; defaults to the current
    /// directory.
    pub context: Option<PathBuf>,
    pub ignore: Vec<String>,
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            command: None,
            path: None,
            context: None,
            ignore: Vec::new(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl WatchOptions {
    pub fn new(command: impl Into<CommandSet>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }
}

/// Notifications from a running watch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Started {
        generation: u64,
        first: bool,
    },
    Changed {
        paths: Vec<PathBuf>,
    },
    Output {
        generation: u64,
        command_index: usize,
        line: String,
        is_stderr: bool,
    },
    Exited {
        generation: u64,
        command_index: usize,
        code: Option<i32>,
    },
    SpawnFailed {
        generation: u64,
        command_index: usize,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Running { generation: u64 },
    Cancelling { generation: u64 },
}

type EventHandler = Arc<dyn Fn(WatchEvent) + Send + Sync>;

/// A process of the current cycle, owned by the task that forwards its output.
struct ActiveProcess {
    kill_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ActiveProcess {
    fn request_kill(self) -> JoinHandle<()> {
        // An error means the task already finished and killed its process.
        let _ = self.kill_tx.send(());
        self.task
    }
}

pub struct WatchRunner {
    commands: Vec<String>,
    path: PathBuf,
    context: PathBuf,
    ignore: IgnoreSet,
    spawner: Arc<dyn Spawner>,
    debouncer: Debouncer,
    on_event: EventHandler,
    active: Vec<ActiveProcess>,
    generation: u64,
    state: WatchState,
}

impl WatchRunner {
    /// Validates `options` without touching the filesystem watcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no command is given.
    pub fn new(options: WatchOptions, spawner: Arc<dyn Spawner>) -> Result<Self> {
        let command = options
            .command
            .filter(|set| !set.is_empty())
            .ok_or_else(|| {
                Error::Configuration(
                    "No watch command given. Pass one on the command line or set \
                     `commands.watch` in devflow.toml."
                        .to_string(),
                )
            })?;
        let commands: Vec<String> = command
            .commands()
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect();

        let cwd = std::env::current_dir()?;
        let context = match options.context {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => cwd.join(dir),
            None => cwd,
        };
        let path = match options.path {
            Some(path) if path.is_absolute() => path,
            Some(path) => context.join(path),
            None => context.clone(),
        };
        let ignore = IgnoreSet::new(&options.ignore)?;

        Ok(Self {
            commands,
            path,
            context,
            ignore,
            spawner,
            debouncer: Debouncer::new(options.debounce),
            on_event: Arc::new(|_: WatchEvent| {}),
            active: Vec::new(),
            generation: 0,
            state: WatchState::Idle,
        })
    }

    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(WatchEvent) + Send + Sync + 'static,
    {
        self.on_event = Arc::new(handler);
        self
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    pub fn ignore(&self) -> &IgnoreSet {
        &self.ignore
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Watches `path` until `shutdown` resolves, then stops every process.
    pub async fn run_until<S>(&mut self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let watcher = FileWatcher::new(&self.path, self.ignore.clone())?;
        let (_guard, changes) = watcher.into_parts();
        self.run_with_changes(changes, shutdown).await
    }

    /// Runs the watch loop over an arbitrary change stream.
    ///
    /// The first cycle starts immediately. The loop ends when `shutdown`
    /// resolves or the stream closes.
    pub async fn run_with_changes<S>(
        &mut self,
        mut changes: mpsc::UnboundedReceiver<ChangeEvent>,
        shutdown: S,
    ) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            command = %self.commands.join(" & "),
            path = %self.path.display(),
            "watching for changes"
        );
        self.restart().await;

        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                _ = &mut shutdown => break,
                change = changes.recv() => match change {
                    Some(change) => {
                        debug!(paths = ?change.paths, "change detected");
                        self.debouncer.trigger(Instant::now());
                        (self.on_event)(WatchEvent::Changed { paths: change.paths });
                    }
                    None => break,
                },
                _ = wait_for(deadline) => {
                    if self.debouncer.fire() {
                        info!(command = %self.commands.join(" & "), "file changed, restarting");
                        self.restart().await;
                    }
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Runs one watch cycle now: stops the previous cycle, then starts every
    /// command.
    pub async fn restart(&mut self) {
        self.cancel_active().await;

        self.generation += 1;
        let generation = self.generation;
        let first = generation == 1;
        (self.on_event)(WatchEvent::Started { generation, first });

        for (command_index, command) in self.commands.iter().enumerate() {
            match self.spawner.spawn(command, Some(&self.context)).await {
                Ok(handle) => {
                    let (kill_tx, kill_rx) = oneshot::channel();
                    let task = tokio::spawn(supervise(
                        handle,
                        kill_rx,
                        generation,
                        command_index,
                        Arc::clone(&self.on_event),
                    ));
                    self.active.push(ActiveProcess { kill_tx, task });
                }
                Err(e) => {
                    warn!(command = %command, error = %e, "failed to start watched command");
                    (self.on_event)(WatchEvent::SpawnFailed {
                        generation,
                        command_index,
                        message: e.to_string(),
                    });
                }
            }
        }

        self.state = if self.active.is_empty() {
            WatchState::Idle
        } else {
            WatchState::Running { generation }
        };
    }

    /// Kills every process of the current cycle and waits for each to exit.
    pub async fn shutdown(&mut self) {
        self.cancel_active().await;
    }

    async fn cancel_active(&mut self) {
        if self.active.is_empty() {
            return;
        }
        self.state = WatchState::Cancelling {
            generation: self.generation,
        };
        debug!(
            generation = self.generation,
            processes = self.active.len(),
            "stopping previous run"
        );

        let tasks: Vec<JoinHandle<()>> = self
            .active
            .drain(..)
            .map(ActiveProcess::request_kill)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "process supervisor failed");
            }
        }
        self.state = WatchState::Idle;
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Forwards a process's output until it is told to stop, then kills it.
///
/// The process is killed even after a natural exit so that anything it left
/// running in its process group goes with it.
async fn supervise(
    mut handle: Box<dyn ProcessHandle>,
    mut kill_rx: oneshot::Receiver<()>,
    generation: u64,
    command_index: usize,
    on_event: EventHandler,
) {
    loop {
        tokio::select! {
            _ = &mut kill_rx => break,
            event = handle.next_event() => match event {
                Ok(Some(ProcessEvent::Stdout(line))) => on_event(WatchEvent::Output {
                    generation,
                    command_index,
                    line,
                    is_stderr: false,
                }),
                Ok(Some(ProcessEvent::Stderr(line))) => on_event(WatchEvent::Output {
                    generation,
                    command_index,
                    line,
                    is_stderr: true,
                }),
                Ok(Some(ProcessEvent::Exit(code))) => {
                    on_event(WatchEvent::Exited {
                        generation,
                        command_index,
                        code,
                    });
                }
                Ok(None) => {
                    let _ = (&mut kill_rx).await;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "lost track of watched process");
                    let _ = (&mut kill_rx).await;
                    break;
                }
            }
        }
    }

    if let Err(e) = handle.kill().await {
        warn!(error = %e, "failed to kill watched process");
    }
}
