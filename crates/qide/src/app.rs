//! The console loop: stdin lines in, rendered session events out.

use std::io::{Stderr, Stdout, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use qide_core::{IdeConfig, SessionEvent, SessionState};
use qide_session::environment::total_memory;
use qide_session::{
    ConsoleChange, ConsoleView, EnvSnapshot, RCommands, SegmentKind, SessionController,
};

use crate::host::{HostCommand, HELP};

/// Line-oriented console over one session controller.
pub struct ConsoleApp<O: Write, E: Write> {
    session: SessionController,
    events: UnboundedReceiver<SessionEvent>,
    view: ConsoleView,
    commands: RCommands,
    prompt: String,
    snapshot_path: PathBuf,
    /// Longest wait for interpreter activity while draining the queue
    drain_idle: Duration,
    /// Refresh command whose completion should print the environment
    env_request: Option<String>,
    out: O,
    err: E,
}

impl ConsoleApp<Stdout, Stderr> {
    /// Console writing to the process's stdout and stderr.
    pub fn stdio(
        session: SessionController,
        events: UnboundedReceiver<SessionEvent>,
        config: &IdeConfig,
    ) -> Self {
        Self::new(session, events, config, std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> ConsoleApp<O, E> {
    /// Console writing output to `out` and errors to `err`.
    pub fn new(
        session: SessionController,
        events: UnboundedReceiver<SessionEvent>,
        config: &IdeConfig,
        out: O,
        err: E,
    ) -> Self {
        Self {
            session,
            events,
            view: ConsoleView::new(config.interpreter.prompt.clone()),
            commands: RCommands::new(config.environment.helper_package.clone()),
            prompt: config.interpreter.prompt.clone(),
            snapshot_path: config.environment.snapshot_path.clone(),
            drain_idle: Duration::from_millis(config.interpreter.terminate_timeout_ms),
            env_request: None,
            out,
            err,
        }
    }

    /// Start the interpreter and serve `input` until `:quit` or end of input.
    ///
    /// Commands still queued when input ends are run before the
    /// interpreter is stopped, unless it goes quiet for longer than the
    /// terminate timeout.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<()> {
        let mut lines = input.lines();

        self.session.start().await;
        self.render()?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("End of input");
                        break;
                    };
                    if !self.execute(HostCommand::parse(&line)).await? {
                        break;
                    }
                }
                event = self.session.recv_process_event() => {
                    self.session.handle(event).await;
                }
            }
            self.render()?;
        }

        self.drain().await?;
        self.session.stop().await;
        self.render()
    }

    /// Hand back the writers.
    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }

    /// Run one input line. Returns false when the console should exit.
    async fn execute(&mut self, command: HostCommand) -> Result<bool> {
        match command {
            HostCommand::Submit(text) => {
                self.session.submit(text, false).await;
            }
            HostCommand::Env => {
                let refresh = self.commands.refresh_environment();
                let text = refresh.text.clone();
                if self.session.submit_command(refresh).await {
                    self.env_request = Some(text);
                }
            }
            HostCommand::Remove(names) => {
                if let Some(command) = self.commands.remove_variables(names.as_slice()) {
                    self.session.submit_command(command).await;
                }
            }
            HostCommand::ClearEnv => {
                let command = self.commands.clear_environment();
                self.session.submit_command(command).await;
            }
            HostCommand::Gc => {
                let command = self.commands.collect_garbage();
                self.session.submit_command(command).await;
            }
            HostCommand::Source(path) => {
                let command = self.commands.source_file(&path);
                self.session.submit_command(command).await;
            }
            HostCommand::Cd(path) => {
                let command = self.commands.set_working_directory(&path);
                self.session.submit_command(command).await;
            }
            HostCommand::Restart => {
                info!("Restart requested");
                self.env_request = None;
                self.session.start().await;
            }
            HostCommand::Quit => return Ok(false),
            HostCommand::Help => {
                self.out.write_all(HELP.as_bytes())?;
                self.out.flush()?;
            }
            HostCommand::Invalid(message) => {
                writeln!(self.err, "{message}")?;
            }
        }
        Ok(true)
    }

    /// Handle process events until the queue has run dry.
    async fn drain(&mut self) -> Result<()> {
        while self.session.is_running()
            && !(self.session.state() == SessionState::Idle && self.session.pending() == 0)
        {
            match tokio::time::timeout(self.drain_idle, self.session.next_event()).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(_) => {
                    warn!(
                        "No interpreter activity for {}ms, giving up on {} queued commands",
                        self.drain_idle.as_millis(),
                        self.session.pending()
                    );
                    break;
                }
            }
            self.render()?;
        }
        Ok(())
    }

    /// Print the session events received so far.
    fn render(&mut self) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            match self.view.apply(&event) {
                ConsoleChange::Appended(segment) => match segment.kind {
                    SegmentKind::Error => self.err.write_all(segment.text.as_bytes())?,
                    _ => self.out.write_all(segment.text.as_bytes())?,
                },
                ConsoleChange::Cleared => self.out.write_all(b"\x0c")?,
                ConsoleChange::Unchanged => {}
            }

            if let SessionEvent::CommandFinished(text) = &event {
                if self.env_request.as_deref() == Some(text.as_str()) {
                    self.env_request = None;
                    self.print_environment()?;
                }
            }
        }
        self.out.flush()?;
        self.err.flush()?;
        Ok(())
    }

    fn print_environment(&mut self) -> Result<()> {
        writeln!(self.out)?;
        match EnvSnapshot::from_file(&self.snapshot_path) {
            Ok(snapshot) if snapshot.is_empty() => writeln!(self.out, "Environment empty")?,
            Ok(snapshot) => {
                writeln!(self.out, "{:<16} {:<12} {:<10} Size", "Name", "Type", "Details")?;
                for entry in &snapshot.entries {
                    writeln!(
                        self.out,
                        "{:<16} {:<12} {:<10} {}",
                        entry.name,
                        entry.type_name,
                        entry.details.as_deref().unwrap_or(""),
                        entry.size_label()
                    )?;
                }
                writeln!(self.out, "{}", snapshot.memory_label(total_memory()))?;
            }
            Err(e) => {
                warn!("Environment snapshot unavailable: {}", e);
                writeln!(self.err, "Environment unavailable: {e}")?;
            }
        }
        self.out.write_all(self.prompt.as_bytes())?;
        Ok(())
    }
}
