//! Session controller: one interpreter process, its command queue and its
//! output framer, driven from a single task.
//!
//! The controller never blocks on the interpreter except inside `stop`,
//! whose wait is bounded by the configured terminate timeout. Failures are
//! reported as [`SessionEvent::Error`] on the event channel and never
//! returned to the caller.
//!
//! # Driving the controller
//!
//! ```no_run
//! # use qide_core::InterpreterSettings;
//! # use qide_session::SessionController;
//! # async fn run() {
//! let (mut session, mut events) = SessionController::channel(InterpreterSettings::default());
//! session.start().await;
//! session.submit("1+1", false).await;
//! while session.next_event().await {
//!     while let Ok(event) = events.try_recv() {
//!         println!("{event:?}");
//!     }
//! }
//! # }
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use qide_core::{
    Error, ExitInfo, InterpreterSettings, PendingCommand, SessionEvent, SessionId, SessionState,
};
use qide_process::{AnsiFilter, ExecutableLocator, InterpreterProcess, LaunchSpec, ProcessEvent};

use crate::framer::{FramerEvent, FramerState, OutputFramer};
use crate::queue::CommandQueue;

/// Owns the interpreter session.
#[derive(Debug)]
pub struct SessionController {
    settings: InterpreterSettings,
    locator: ExecutableLocator,
    extra_env: Vec<(String, String)>,
    started: bool,
    session_id: SessionId,
    process: Option<InterpreterProcess>,
    process_events: Option<mpsc::UnboundedReceiver<ProcessEvent>>,
    stdout_filter: AnsiFilter,
    stderr_filter: AnsiFilter,
    queue: CommandQueue,
    framer: OutputFramer,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionController {
    /// Create a controller that reports to `events`.
    pub fn new(settings: InterpreterSettings, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        let locator = ExecutableLocator::from_settings(&settings);
        let framer = OutputFramer::new(settings.prompt.clone());
        Self {
            settings,
            locator,
            extra_env: Vec::new(),
            started: false,
            session_id: SessionId::new(),
            process: None,
            process_events: None,
            stdout_filter: AnsiFilter::new(),
            stderr_filter: AnsiFilter::new(),
            queue: CommandQueue::new(),
            framer,
            events,
        }
    }

    /// Create a controller together with the receiving end of its events.
    pub fn channel(settings: InterpreterSettings) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(settings, tx), rx)
    }

    /// Set an environment variable for every process this controller starts.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.extra_env.retain(|(k, _)| *k != key);
        self.extra_env.push((key, value.into()));
        self
    }

    /// Id of the current (or last) process lifetime.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        if !self.started {
            return SessionState::NotStarted;
        }
        match self.framer.state() {
            FramerState::AwaitingFirstPrompt => SessionState::AwaitingFirstPrompt,
            FramerState::Idle => SessionState::Idle,
            FramerState::ExecutingVisible => SessionState::Executing { silent: false },
            FramerState::ExecutingSilent => SessionState::Executing { silent: true },
            FramerState::Stopped => SessionState::Stopped,
        }
    }

    /// Whether an interpreter process is alive.
    pub fn is_running(&self) -> bool {
        self.process.as_ref().is_some_and(|p| p.is_running())
    }

    /// Number of commands waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The command in flight, if any.
    pub fn current_command(&self) -> Option<&PendingCommand> {
        self.framer.current_command()
    }

    /// OS process id of the interpreter.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.pid())
    }

    /// Launch the interpreter, stopping a running one first.
    ///
    /// Emits `Started` on success. Returns whether a process was launched;
    /// the reason for a failure is delivered as an error event.
    pub async fn start(&mut self) -> bool {
        if self.process.is_some() {
            info!("Restarting interpreter session {}", self.session_id);
            self.stop().await;
        }

        self.started = true;
        self.queue.clear();

        let program = match self.locator.locate() {
            Ok(program) => program,
            Err(e) => {
                self.emit_error(&e);
                return false;
            }
        };

        let mut spec = LaunchSpec::from_settings(&program, &self.settings);
        for (key, value) in &self.extra_env {
            spec = spec.with_env(key.clone(), value.clone());
        }

        match InterpreterProcess::spawn(&spec) {
            Ok((process, process_events)) => {
                self.session_id = SessionId::new();
                self.stdout_filter.reset();
                self.stderr_filter.reset();
                self.framer.reset();

                info!(
                    "Interpreter session {} started: pid={:?}",
                    self.session_id,
                    process.pid()
                );

                self.process = Some(process);
                self.process_events = Some(process_events);
                self.emit(SessionEvent::Started);
                true
            }
            Err(e) => {
                self.emit_error(&e);
                false
            }
        }
    }

    /// Stop the interpreter: quit command, bounded wait, then kill.
    ///
    /// Emits `Finished`; no output event follows it. A `ProcessTimeout`
    /// error precedes it when the interpreter had to be killed. Waiting
    /// commands stay queued until the next `start`.
    pub async fn stop(&mut self) {
        // What already arrived belongs to this session, an exit included
        if let Some(mut rx) = self.process_events.take() {
            while let Ok(event) = rx.try_recv() {
                self.absorb(event);
            }
        }

        let Some(mut process) = self.process.take() else {
            debug!("stop: no interpreter running");
            return;
        };

        if let Some(exit) = process.exit_info() {
            debug!("Interpreter exited before the stop request");
            self.process = Some(process);
            self.on_exited(exit);
            return;
        }

        info!("Stopping interpreter session {}", self.session_id);

        let leftover = self.framer.stop();
        self.forward(leftover);

        let timeout = Duration::from_millis(self.settings.terminate_timeout_ms);
        let (exit, killed) = process.terminate(&self.settings.quit_command, timeout).await;
        if killed {
            self.emit_error(&Error::ProcessTimeout(self.settings.terminate_timeout_ms));
        }

        info!("Interpreter session {} stopped: {}", self.session_id, exit);
        self.emit(SessionEvent::Finished(exit));
    }

    /// Queue a command. Returns false, after one `NotRunning` error event,
    /// when no interpreter is running.
    pub async fn submit(&mut self, text: impl Into<String>, silent: bool) -> bool {
        self.submit_command(PendingCommand::new(text, silent)).await
    }

    /// Queue an already built command.
    pub async fn submit_command(&mut self, command: PendingCommand) -> bool {
        if !self.is_running() {
            warn!("Command rejected, interpreter not running: {:?}", command.text);
            self.emit_error(&Error::NotRunning);
            return false;
        }

        debug!(
            "Queueing command: silent={} pending={}",
            command.silent,
            self.queue.len()
        );
        self.queue.push(command);
        self.dispatch_next().await;
        true
    }

    /// Wait for the next event from the interpreter process.
    ///
    /// Cancel safe, so it can sit in a `tokio::select!` next to other input
    /// sources; pass the result to [`handle`](Self::handle). Never resolves
    /// while no process is running.
    pub async fn recv_process_event(&mut self) -> ProcessEvent {
        match self.process_events.as_mut() {
            Some(rx) => match rx.recv().await {
                Some(event) => event,
                None => {
                    warn!("Process event channel closed without an exit notification");
                    ProcessEvent::Exited(ExitInfo::unknown())
                }
            },
            None => std::future::pending().await,
        }
    }

    /// Wait for and handle one process event. Returns false when no
    /// process is running.
    pub async fn next_event(&mut self) -> bool {
        if self.process_events.is_none() {
            return false;
        }
        let event = self.recv_process_event().await;
        self.handle(event).await;
        true
    }

    /// Apply one process event.
    pub async fn handle(&mut self, event: ProcessEvent) {
        if self.absorb(event) {
            self.dispatch_next().await;
        }
    }

    /// Apply one process event without dispatching. Returns whether the
    /// interpreter became idle.
    fn absorb(&mut self, event: ProcessEvent) -> bool {
        if self.process.is_none() {
            debug!("Ignoring event for a stopped interpreter: {:?}", event);
            return false;
        }

        match event {
            ProcessEvent::Stdout(bytes) => {
                let text = self.stdout_filter.filter(&bytes);
                let events = self.framer.push_stdout(&text);
                self.forward(events)
            }
            ProcessEvent::Stderr(bytes) => {
                let text = self.stderr_filter.filter(&bytes);
                let events = self.framer.push_stderr(&text);
                self.forward(events)
            }
            ProcessEvent::ReadFailed(message) => {
                self.emit_error(&Error::ReadError(message));
                false
            }
            ProcessEvent::Exited(exit) => {
                self.on_exited(exit);
                false
            }
        }
    }

    fn on_exited(&mut self, exit: ExitInfo) {
        self.process = None;
        self.process_events = None;

        let leftover = self.framer.stop();
        self.forward(leftover);

        if exit.crashed {
            error!("Interpreter session {} crashed: {}", self.session_id, exit);
            self.emit_error(&Error::ProcessCrashed(exit.to_string()));
        } else {
            info!("Interpreter session {} exited: {}", self.session_id, exit);
        }

        if !self.queue.is_empty() {
            warn!("{} queued commands were not run", self.queue.len());
        }
        self.emit(SessionEvent::Finished(exit));
    }

    /// Publish framer events. Returns whether the interpreter became idle.
    fn forward(&self, events: Vec<FramerEvent>) -> bool {
        let mut became_idle = false;
        for event in events {
            match event {
                FramerEvent::Output(text) => self.emit(SessionEvent::Output(text)),
                FramerEvent::Error(text) => self.emit(SessionEvent::Error(text)),
                FramerEvent::Prompt => self.emit(SessionEvent::Prompt),
                FramerEvent::Clear => self.emit(SessionEvent::Clear),
                FramerEvent::Ready => {
                    info!("Interpreter session {} ready", self.session_id);
                    became_idle = true;
                }
                FramerEvent::CommandFinished(text) => {
                    self.emit(SessionEvent::CommandFinished(text));
                    became_idle = true;
                }
            }
        }
        became_idle
    }

    /// Send the oldest queued command if the interpreter is idle.
    async fn dispatch_next(&mut self) {
        if !self.framer.is_idle() {
            return;
        }
        let Some(process) = self.process.as_mut() else {
            return;
        };
        let Some(command) = self.queue.dequeue_next() else {
            return;
        };

        let text = command.text.clone();
        if let Err(command) = self.framer.begin(command) {
            self.queue.requeue_front(command);
            return;
        }

        if let Err(e) = process.write_line(&text).await {
            if let Some(command) = self.framer.abort_current() {
                self.queue.requeue_front(command);
            }
            self.emit_error(&e);
        }
    }

    fn emit_error(&self, error: &Error) {
        warn!("Session error: {}", error);
        self.emit(SessionEvent::Error(error.to_string()));
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("Session event dropped, receiver is gone");
        }
    }
}
