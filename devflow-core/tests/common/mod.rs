//! Scripted process spawner shared by integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use devflow_core::error::{Error, Result};
use devflow_core::process::{ProcessEvent, ProcessHandle, Spawner};

#[derive(Debug, Clone)]
pub enum Script {
    /// Emits the given events, then reports no more.
    Finite(Vec<ProcessEvent>),
    /// Never exits on its own.
    LongRunning,
    /// Fails to spawn.
    FailSpawn,
}

/// Records every spawn, exit and kill in one ordered log.
#[derive(Clone, Default)]
pub struct RecordingSpawner {
    log: Arc<Mutex<Vec<String>>>,
    scripts: Arc<Mutex<HashMap<String, Script>>>,
}

impl RecordingSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, command: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(command.to_string(), script);
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.log().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.log().iter().position(|e| e == entry)
    }

    pub fn positions(&self, entry: &str) -> Vec<usize> {
        self.log()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.as_str() == entry)
            .map(|(i, _)| i)
            .collect()
    }
}

#[async_trait]
impl Spawner for RecordingSpawner {
    async fn spawn(&self, command: &str, _cwd: Option<&Path>) -> Result<Box<dyn ProcessHandle>> {
        self.log.lock().unwrap().push(format!("spawn {}", command));

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_else(|| {
                Script::Finite(vec![
                    ProcessEvent::Stdout(command.to_string()),
                    ProcessEvent::Exit(Some(0)),
                ])
            });

        let (events, long_running) = match script {
            Script::Finite(events) => (events.into_iter().collect(), false),
            Script::LongRunning => (VecDeque::new(), true),
            Script::FailSpawn => {
                return Err(Error::Spawn {
                    command: command.to_string(),
                    message: "No such file or directory".to_string(),
                })
            }
        };

        Ok(Box::new(ScriptedProcess {
            command: command.to_string(),
            events,
            long_running,
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedProcess {
    command: String,
    events: VecDeque<ProcessEvent>,
    long_running: bool,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ProcessHandle for ScriptedProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    async fn next_event(&mut self) -> Result<Option<ProcessEvent>> {
        if let Some(event) = self.events.pop_front() {
            if let ProcessEvent::Exit(_) = event {
                self.log
                    .lock()
                    .unwrap()
                    .push(format!("exit {}", self.command));
            }
            return Ok(Some(event));
        }
        if self.long_running {
            std::future::pending::<()>().await;
        }
        Ok(None)
    }

    async fn kill(&mut self) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("kill {}", self.command));
        tokio::task::yield_now().await;
        self.log
            .lock()
            .unwrap()
            .push(format!("killed {}", self.command));
        Ok(())
    }
}
