//! Spawning shell commands with streamed output.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// A notification from a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One line of standard output, without the trailing newline.
    Stdout(String),
    /// One line of standard error, without the trailing newline.
    Stderr(String),
    /// The process terminated. Always the last event.
    Exit(Option<i32>),
}

/// A live reference to a spawned process.
#[async_trait]
pub trait ProcessHandle: Send {
    fn id(&self) -> Option<u32>;

    /// Returns the next output line or the exit notification.
    ///
    /// Yields `Ok(None)` once the exit has been reported.
    async fn next_event(&mut self) -> Result<Option<ProcessEvent>>;

    /// Terminates the process and waits until it is gone.
    async fn kill(&mut self) -> Result<()>;
}

/// Starts shell commands.
#[async_trait]
pub trait Spawner: Send + Sync {
    async fn spawn(&self, command: &str, cwd: Option<&Path>) -> Result<Box<dyn ProcessHandle>>;
}

/// How long output is still collected after the shell itself has exited.
///
/// Anything the command left running in the background may hold the output
/// pipes open indefinitely; its output past this window is dropped.
pub const OUTPUT_GRACE: Duration = Duration::from_millis(100);

/// Runs commands through the platform shell (`sh -c` or `cmd /C`).
///
/// [`ShellSpawner::new`] puts each child in a process group of its own with
/// stdin closed, so [`ProcessHandle::kill`] reaches everything the command
/// started. [`ShellSpawner::foreground`] keeps children in the caller's
/// process group with the terminal's stdin, so they can prompt and receive
/// Ctrl-C along with the caller; only the shell itself is killed.
#[derive(Debug, Clone, Copy)]
pub struct ShellSpawner {
    own_group: bool,
}

impl Default for ShellSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellSpawner {
    pub fn new() -> Self {
        Self { own_group: true }
    }

    pub fn foreground() -> Self {
        Self { own_group: false }
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

#[async_trait]
impl Spawner for ShellSpawner {
    async fn spawn(&self, command: &str, cwd: Option<&Path>) -> Result<Box<dyn ProcessHandle>> {
        let process = ShellProcess::spawn(command, cwd, self.own_group)?;
        Ok(Box::new(process))
    }
}

/// A child of [`ShellSpawner`].
///
/// The exit is reported as soon as the shell terminates, not when its output
/// pipes close.
pub struct ShellProcess {
    command: String,
    child: Child,
    pid: Option<u32>,
    own_group: bool,
    lines: mpsc::UnboundedReceiver<ProcessEvent>,
    /// Exit code, once the shell has been reaped.
    status: Option<Option<i32>>,
    drain_deadline: Option<Instant>,
    flushed: bool,
    /// Output pipes were still open when the exit was reported.
    lingering: bool,
    group_signalled: bool,
    reported: bool,
}

enum Step {
    Line(Option<ProcessEvent>),
    Exited(std::io::Result<ExitStatus>),
}

impl ShellProcess {
    pub fn spawn(command: &str, cwd: Option<&Path>, own_group: bool) -> Result<Self> {
        let mut cmd = ShellSpawner::shell_command(command);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if own_group {
            cmd.stdin(Stdio::null());
            #[cfg(unix)]
            cmd.process_group(0);
        } else {
            cmd.stdin(Stdio::inherit());
        }
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| Error::Spawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| Error::Spawn {
            command: command.to_string(),
            message: "Failed to capture stdout".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| Error::Spawn {
            command: command.to_string(),
            message: "Failed to capture stderr".to_string(),
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_lines(stdout, tx.clone(), ProcessEvent::Stdout));
        tokio::spawn(forward_lines(stderr, tx, ProcessEvent::Stderr));

        let pid = child.id();
        debug!(command, pid = ?pid, own_group, "spawned process");

        Ok(Self {
            command: command.to_string(),
            child,
            pid,
            own_group,
            lines: rx,
            status: None,
            drain_deadline: None,
            flushed: false,
            lingering: false,
            group_signalled: false,
            reported: false,
        })
    }

    /// Sends SIGKILL to the child's process group, at most once.
    ///
    /// After the shell has been reaped its pgid is only signalled when
    /// something it started was still holding the output pipes.
    #[cfg(unix)]
    fn signal_group(&mut self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if !self.own_group || self.group_signalled {
            return;
        }
        if self.status.is_some() && !self.lingering {
            return;
        }
        if let Some(pgid) = self.pid {
            self.group_signalled = true;
            // ESRCH only means the whole group is already gone.
            if let Err(e) = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
                trace!(pgid, error = %e, "killpg failed");
            }
        }
    }

    fn record_exit(&mut self, status: std::io::Result<ExitStatus>) -> Result<()> {
        let status = status.map_err(|e| Error::Spawn {
            command: self.command.clone(),
            message: format!("Failed to wait for process: {}", e),
        })?;
        self.status = Some(status.code());
        Ok(())
    }

    async fn reap(&mut self) -> Result<()> {
        if self.status.is_none() {
            let status = self.child.wait().await;
            self.record_exit(status)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessHandle for ShellProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    async fn next_event(&mut self) -> Result<Option<ProcessEvent>> {
        if self.reported {
            return Ok(None);
        }

        while self.status.is_none() {
            let step = tokio::select! {
                biased;
                line = self.lines.recv() => Step::Line(line),
                status = self.child.wait() => Step::Exited(status),
            };
            match step {
                Step::Line(Some(event)) => return Ok(Some(event)),
                Step::Line(None) => self.reap().await?,
                Step::Exited(status) => self.record_exit(status)?,
            }
        }

        // The shell is gone; flush what its pipes still deliver, briefly.
        if !self.flushed {
            let deadline = *self
                .drain_deadline
                .get_or_insert_with(|| Instant::now() + OUTPUT_GRACE);
            let at_eof = if Instant::now() < deadline {
                tokio::select! {
                    biased;
                    line = self.lines.recv() => match line {
                        Some(event) => return Ok(Some(event)),
                        None => true,
                    },
                    _ = tokio::time::sleep_until(deadline) => false,
                }
            } else {
                match self.lines.try_recv() {
                    Err(TryRecvError::Disconnected) => true,
                    Err(TryRecvError::Empty) => false,
                    Ok(event) => {
                        self.lingering = true;
                        self.lines.close();
                        self.flushed = true;
                        return Ok(Some(event));
                    }
                }
            };
            if !at_eof {
                debug!(command = %self.command, "output still open after exit");
                self.lingering = true;
                self.lines.close();
            }
            self.flushed = true;
        }
        if let Ok(event) = self.lines.try_recv() {
            return Ok(Some(event));
        }

        self.reported = true;
        Ok(Some(ProcessEvent::Exit(self.status.flatten())))
    }

    async fn kill(&mut self) -> Result<()> {
        if self.status.is_none() {
            debug!(command = %self.command, pid = ?self.pid, "killing process");

            if cfg!(unix) && self.own_group {
                #[cfg(unix)]
                self.signal_group();
            } else if let Err(e) = self.child.start_kill() {
                trace!(error = %e, "start_kill failed");
            }

            self.reap().await?;
        } else {
            #[cfg(unix)]
            self.signal_group();
        }

        self.reported = true;
        self.lines.close();
        Ok(())
    }
}

async fn forward_lines<R, F>(reader: R, tx: mpsc::UnboundedSender<ProcessEvent>, wrap: F)
where
    R: AsyncRead + Unpin,
    F: Fn(String) -> ProcessEvent,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if tx.send(wrap(line.to_string())).is_err() {
                    break;
                }
            }
            Err(e) => {
                trace!(error = %e, "stopped reading process output");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    async fn collect(handle: &mut dyn ProcessHandle) -> Vec<ProcessEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await.unwrap() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_shell_process_streams_stdout_then_exit() {
        let mut process = ShellSpawner::new().spawn("echo hello", None).await.unwrap();
        let events = collect(process.as_mut()).await;
        assert_eq!(
            events,
            vec![
                ProcessEvent::Stdout("hello".to_string()),
                ProcessEvent::Exit(Some(0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_shell_process_reports_stderr_and_code() {
        let mut process = ShellSpawner::new()
            .spawn("echo oops 1>&2; exit 3", None)
            .await
            .unwrap();
        let events = collect(process.as_mut()).await;
        assert!(events.contains(&ProcessEvent::Stderr("oops".to_string())));
        assert_eq!(events.last(), Some(&ProcessEvent::Exit(Some(3))));
    }

    #[tokio::test]
    async fn test_shell_process_uses_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let mut process = ShellSpawner::new()
            .spawn("ls", Some(dir.path()))
            .await
            .unwrap();
        let events = collect(process.as_mut()).await;
        assert!(events.contains(&ProcessEvent::Stdout("marker.txt".to_string())));
    }

    #[tokio::test]
    async fn test_kill_terminates_long_running_process() {
        let mut process = ShellSpawner::new().spawn("sleep 30", None).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), process.kill())
            .await
            .expect("kill should not hang")
            .unwrap();
        assert!(process.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exit_is_reported_while_background_child_holds_output() {
        let mut process = ShellProcess::spawn("sleep 4 & echo started", None, true).unwrap();

        let events = tokio::time::timeout(Duration::from_secs(2), collect(&mut process))
            .await
            .expect("exit should not wait for the background child");
        assert_eq!(
            events,
            vec![
                ProcessEvent::Stdout("started".to_string()),
                ProcessEvent::Exit(Some(0)),
            ]
        );
        assert!(process.lingering);

        process.kill().await.unwrap();
        assert!(process.group_signalled);
    }

    #[tokio::test]
    async fn test_kill_after_clean_exit_leaves_group_alone() {
        let mut process = ShellProcess::spawn("echo done", None, true).unwrap();
        let events = collect(&mut process).await;
        assert_eq!(events.last(), Some(&ProcessEvent::Exit(Some(0))));

        process.kill().await.unwrap();
        process.kill().await.unwrap();
        assert!(!process.lingering);
        assert!(!process.group_signalled);
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: i32) -> bool {
        // A killed orphan may linger as a zombie until init reaps it.
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_kill_takes_down_background_grandchild() {
        let mut process = ShellProcess::spawn("sleep 30 & echo $!; wait", None, true).unwrap();
        let grandchild = match process.next_event().await.unwrap() {
            Some(ProcessEvent::Stdout(line)) => line.trim().parse::<i32>().unwrap(),
            other => panic!("expected the background pid, got {:?}", other),
        };
        assert!(is_running(grandchild));

        tokio::time::timeout(Duration::from_secs(5), process.kill())
            .await
            .expect("kill should not hang")
            .unwrap();

        let mut gone = false;
        for _ in 0..50 {
            if !is_running(grandchild) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "background sleep {} survived the kill", grandchild);
    }

    #[tokio::test]
    async fn test_foreground_process_shares_callers_group() {
        use nix::unistd::{getpgid, Pid};

        let mut process = ShellProcess::spawn("sleep 30", None, false).unwrap();
        let pid = Pid::from_raw(process.id().unwrap() as i32);
        assert_eq!(getpgid(Some(pid)).unwrap(), getpgid(None).unwrap());

        tokio::time::timeout(Duration::from_secs(5), process.kill())
            .await
            .expect("kill should not hang")
            .unwrap();
        assert!(process.next_event().await.unwrap().is_none());
    }
}
