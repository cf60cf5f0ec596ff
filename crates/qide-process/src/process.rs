//! Interpreter process lifecycle with piped stdio.
//!
//! Stdout and stderr are read by background tasks and delivered, together
//! with the exit notification, over a single channel so the consumer can
//! handle everything on one task in arrival order.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use qide_core::{Error, ExitInfo, InterpreterSettings, Result};

/// How long the exit monitor waits for the readers to drain after the
/// process is gone. A grandchild holding the pipe open must not stall exit.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Something that happened to the interpreter process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Bytes read from stdout
    Stdout(Vec<u8>),
    /// Bytes read from stderr
    Stderr(Vec<u8>),
    /// Reading one of the streams failed
    ReadFailed(String),
    /// The process exited; always the last event
    Exited(ExitInfo),
}

/// Everything needed to launch the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable path
    pub program: PathBuf,
    /// Command-line arguments
    pub args: Vec<String>,
    /// Environment overrides
    pub env: Vec<(String, String)>,
    /// Working directory
    pub working_directory: Option<PathBuf>,
}

impl LaunchSpec {
    /// Launch `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_directory: None,
        }
    }

    /// Launch a located executable with the configured arguments and locale.
    pub fn from_settings(program: &Path, settings: &InterpreterSettings) -> Self {
        let mut spec = Self::new(program);
        spec.args = settings.args.clone();
        spec.working_directory = settings.working_directory.clone();
        if let Some(locale) = &settings.locale {
            spec = spec
                .with_env("LANG", locale.clone())
                .with_env("LC_ALL", locale.clone());
        }
        spec
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable, replacing an earlier value for the key.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.into()));
        self
    }
}

/// Handle to a running interpreter process.
pub struct InterpreterProcess {
    stdin: Option<ChildStdin>,
    pid: Option<u32>,
    kill_tx: Option<oneshot::Sender<()>>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
}

impl std::fmt::Debug for InterpreterProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterProcess")
            .field("pid", &self.pid)
            .field("exit", &*self.exit_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl InterpreterProcess {
    /// Spawn the interpreter.
    ///
    /// Returns the handle and the receiver for its output and exit events.
    /// Must be called from within a Tokio runtime.
    pub fn spawn(spec: &LaunchSpec) -> Result<(Self, mpsc::UnboundedReceiver<ProcessEvent>)> {
        if spec.program.as_os_str().is_empty() {
            return Err(Error::FailedToStart("empty executable path".to_string()));
        }

        info!(
            "Spawning interpreter: program='{}' args={:?} cwd={:?}",
            spec.program.display(),
            spec.args,
            spec.working_directory
        );

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.working_directory {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn '{}': {}", spec.program.display(), e);
            Error::FailedToStart(format!("{}: {e}", spec.program.display()))
        })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::FailedToStart("no stdout pipe".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::FailedToStart("no stderr pipe".to_string()))?;
        let pid = child.id();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let stdout_task = spawn_reader(stdout, events_tx.clone(), ProcessEvent::Stdout);
        let stderr_task = spawn_reader(stderr, events_tx.clone(), ProcessEvent::Stderr);

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = watch::channel(None);

        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                // Fires on an explicit kill and when the handle is dropped
                _ = kill_rx => None,
            };

            let status = match exited {
                Some(status) => status,
                None => {
                    if let Err(e) = child.start_kill() {
                        warn!("Failed to kill interpreter: {}", e);
                    }
                    child.wait().await
                }
            };

            let info = match status {
                Ok(status) => ExitInfo::from(status),
                Err(e) => {
                    error!("Failed to reap interpreter: {}", e);
                    ExitInfo::unknown()
                }
            };

            for task in [stdout_task, stderr_task] {
                if tokio::time::timeout(READER_DRAIN_TIMEOUT, task).await.is_err() {
                    debug!("Output reader still open after exit, abandoning it");
                }
            }

            info!("Interpreter exited: {}", info);
            let _ = exit_tx.send(Some(info));
            let _ = events_tx.send(ProcessEvent::Exited(info));
        });

        info!("Interpreter spawned: pid={:?}", pid);

        Ok((
            Self {
                stdin,
                pid,
                kill_tx: Some(kill_tx),
                exit_rx,
            },
            events_rx,
        ))
    }

    /// OS process id, if still known.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the process has not exited yet.
    pub fn is_running(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }

    /// Exit information once the process has ended.
    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.exit_rx.borrow()
    }

    /// Write one line to the interpreter's stdin. A newline is appended.
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::WriteError("stdin is closed".to_string()))?;

        debug!("Writing {} bytes to interpreter", text.len() + 1);

        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');

        stdin
            .write_all(&line)
            .await
            .map_err(|e| Error::WriteError(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::WriteError(e.to_string()))
    }

    /// Request a forced kill. Completion is observed through `wait`.
    pub fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            info!("Killing interpreter: pid={:?}", self.pid);
            let _ = tx.send(());
        }
    }

    /// Wait until the process has exited.
    pub async fn wait(&mut self) -> ExitInfo {
        loop {
            let current = *self.exit_rx.borrow();
            if let Some(info) = current {
                return info;
            }
            if self.exit_rx.changed().await.is_err() {
                return ExitInfo::unknown();
            }
        }
    }

    /// Stop the interpreter: quit command first, kill after `timeout`.
    ///
    /// The flag is true when the interpreter ignored the quit command and
    /// had to be killed.
    pub async fn terminate(&mut self, quit_command: &str, timeout: Duration) -> (ExitInfo, bool) {
        if let Some(info) = self.exit_info() {
            return (info, false);
        }

        info!("Terminating interpreter: pid={:?}", self.pid);

        if let Err(e) = self.write_line(quit_command).await {
            debug!("Quit command not delivered: {}", e);
        }
        // EOF on stdin also ends an interactive R session
        self.stdin = None;

        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(info) => (info, false),
            Err(_) => {
                warn!(
                    "Interpreter did not exit within {}ms, killing",
                    timeout.as_millis()
                );
                self.kill();
                (self.wait().await, true)
            }
        }
    }
}

fn spawn_reader<R>(
    mut reader: R,
    events: mpsc::UnboundedSender<ProcessEvent>,
    wrap: fn(Vec<u8>) -> ProcessEvent,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = vec![0u8; 4096];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => {
                    if events.send(wrap(buffer[..n].to_vec())).is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(e) => {
                    error!("Failed to read interpreter output: {}", e);
                    let _ = events.send(ProcessEvent::ReadFailed(e.to_string()));
                    break;
                }
            }
        }
    })
}
