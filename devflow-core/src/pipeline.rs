//! Strictly sequential execution of a job's commands.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Error;
use crate::job::Job;
use crate::process::{ProcessEvent, Spawner};

/// How a command's exit status affects the rest of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Any exit counts as progress; only spawn and I/O failures stop the run.
    #[default]
    Ignore,
    /// A non-zero exit stops the run like a spawn failure.
    Strict,
}

/// Streamed notification from a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Started { index: usize, command: String },
    Data { index: usize, line: String },
    Error { index: usize, line: String },
    Exited { index: usize, code: Option<i32> },
}

/// Terminal outcome of a pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    Success,
    Failed {
        index: usize,
        command: String,
        error: Error,
    },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success)
    }
}

/// Runs commands one at a time, in order, halting at the first failure.
pub struct CommandPipeline {
    spawner: Arc<dyn Spawner>,
    exit_policy: ExitPolicy,
}

impl CommandPipeline {
    pub fn new(spawner: Arc<dyn Spawner>) -> Self {
        Self {
            spawner,
            exit_policy: ExitPolicy::default(),
        }
    }

    pub fn with_exit_policy(mut self, exit_policy: ExitPolicy) -> Self {
        self.exit_policy = exit_policy;
        self
    }

    /// Runs `job`, forwarding output to `on_event` as it arrives.
    ///
    /// Command N+1 is spawned only after command N has reported its exit.
    pub async fn run<F>(&self, job: &Job, on_event: F) -> PipelineOutcome
    where
        F: FnMut(PipelineEvent),
    {
        self.run_until(job, on_event, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but gives up once `shutdown` resolves.
    ///
    /// The running command is killed and awaited, and the outcome is a
    /// failure with [`Error::Interrupted`].
    pub async fn run_until<F, S>(&self, job: &Job, mut on_event: F, shutdown: S) -> PipelineOutcome
    where
        F: FnMut(PipelineEvent),
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        for (index, command) in job.commands().iter().enumerate() {
            debug!(index, command = %command, "starting pipeline command");
            on_event(PipelineEvent::Started {
                index,
                command: command.clone(),
            });

            let result = self
                .run_one(index, command, job, &mut on_event, shutdown.as_mut())
                .await;
            if let Err(error) = result {
                warn!(index, command = %command, error = %error, "pipeline stopped");
                return PipelineOutcome::Failed {
                    index,
                    command: command.clone(),
                    error,
                };
            }
        }

        PipelineOutcome::Success
    }

    async fn run_one<F, S>(
        &self,
        index: usize,
        command: &str,
        job: &Job,
        on_event: &mut F,
        mut shutdown: Pin<&mut S>,
    ) -> Result<(), Error>
    where
        F: FnMut(PipelineEvent),
        S: Future<Output = ()>,
    {
        let mut process = self.spawner.spawn(command, job.cwd()).await?;

        loop {
            let event = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!(index, command = %command, "interrupted, killing command");
                    process.kill().await?;
                    return Err(Error::Interrupted {
                        command: command.to_string(),
                    });
                }
                event = process.next_event() => event?,
            };
            let Some(event) = event else {
                break;
            };
            match event {
                ProcessEvent::Stdout(line) => on_event(PipelineEvent::Data { index, line }),
                ProcessEvent::Stderr(line) => on_event(PipelineEvent::Error { index, line }),
                ProcessEvent::Exit(code) => {
                    on_event(PipelineEvent::Exited { index, code });
                    if self.exit_policy == ExitPolicy::Strict && code != Some(0) {
                        return Err(Error::NonZeroExit {
                            command: command.to_string(),
                            code,
                        });
                    }
                    break;
                }
            }
        }

        Ok(())
    }
}
