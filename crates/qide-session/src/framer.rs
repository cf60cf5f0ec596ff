//! Output framing for the interpreter's text streams.
//!
//! The interpreter speaks free-form text. The framer decides from that text
//! alone when the interpreter is waiting for input (a prompt marker), which
//! part of the output is the echo of the submitted command, and what should
//! reach the console. It performs no I/O: text goes in, [`FramerEvent`]s
//! come out, and the session controller acts on them.
//!
//! Prompt detection is heuristic. A command whose own output contains the
//! prompt marker completes early; silent commands are the most exposed since
//! their output is never inspected line by line. There is no out-of-band
//! channel to do better.

use tracing::debug;

use qide_core::PendingCommand;

/// Form feed: the interpreter asks the console to clear.
const FORM_FEED: char = '\x0c';

/// Framer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramerState {
    /// Process launched, no prompt seen yet
    AwaitingFirstPrompt,
    /// Waiting for the next command
    Idle,
    /// A command with visible output is in flight
    ExecutingVisible,
    /// A silent command is in flight
    ExecutingSilent,
    /// No process; all input is ignored
    Stopped,
}

/// What the framer decided about a piece of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
    /// Text to display
    Output(String),
    /// Error text to display
    Error(String),
    /// Render a fresh prompt
    Prompt,
    /// Clear the display
    Clear,
    /// The first prompt arrived; the interpreter accepts commands
    Ready,
    /// The in-flight command completed
    CommandFinished(String),
}

/// Prompt-driven state machine over the interpreter's output.
#[derive(Debug)]
pub struct OutputFramer {
    state: FramerState,
    /// Full prompt marker, e.g. `"> "`
    prompt: String,
    /// Marker without trailing whitespace, e.g. `">"`
    bare_prompt: String,
    /// Display text held back until a line or a prompt completes
    pending: String,
    /// Tail of the output used for prompt detection across chunks
    lookback: String,
    current: Option<PendingCommand>,
    /// Command text whose echo has not been stripped yet
    echo: Option<String>,
    /// A bare marker ended the last chunk; drop one leading space next time
    swallow_space: bool,
}

impl OutputFramer {
    /// Create a framer for the given prompt marker, in the `Stopped` state.
    pub fn new(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let bare_prompt = prompt.trim_end().to_string();
        Self {
            state: FramerState::Stopped,
            prompt,
            bare_prompt,
            pending: String::new(),
            lookback: String::new(),
            current: None,
            echo: None,
            swallow_space: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Whether a new command may be dispatched.
    pub fn is_idle(&self) -> bool {
        self.state == FramerState::Idle
    }

    /// The command in flight, if any.
    pub fn current_command(&self) -> Option<&PendingCommand> {
        self.current.as_ref()
    }

    /// Start over for a freshly launched process.
    pub fn reset(&mut self) {
        self.clear_buffers();
        self.current = None;
        self.state = FramerState::AwaitingFirstPrompt;
    }

    /// The process is gone. Returns held-back display text, if any.
    pub fn stop(&mut self) -> Vec<FramerEvent> {
        let mut events = Vec::new();
        if self.state != FramerState::ExecutingSilent && !self.pending.is_empty() {
            events.push(FramerEvent::Output(std::mem::take(&mut self.pending)));
        }
        self.clear_buffers();
        self.current = None;
        self.state = FramerState::Stopped;
        events
    }

    /// Mark `command` as in flight. Only valid while idle; otherwise the
    /// command is handed back unchanged.
    pub fn begin(&mut self, command: PendingCommand) -> Result<(), PendingCommand> {
        if self.state != FramerState::Idle {
            return Err(command);
        }

        debug!(
            "Command in flight: silent={} text={:?}",
            command.silent, command.text
        );

        self.lookback.clear();
        if command.silent {
            self.state = FramerState::ExecutingSilent;
            self.echo = None;
        } else {
            self.state = FramerState::ExecutingVisible;
            self.echo = Some(command.text.clone());
        }
        self.current = Some(command);
        Ok(())
    }

    /// Take back the in-flight command after it could not be delivered.
    pub fn abort_current(&mut self) -> Option<PendingCommand> {
        if matches!(
            self.state,
            FramerState::ExecutingVisible | FramerState::ExecutingSilent
        ) {
            self.state = FramerState::Idle;
        }
        self.echo = None;
        self.lookback.clear();
        self.current.take()
    }

    /// Feed ANSI-free stdout text.
    pub fn push_stdout(&mut self, text: &str) -> Vec<FramerEvent> {
        let mut events = Vec::new();
        self.process_stdout(text, &mut events);
        events
    }

    /// Feed ANSI-free stderr text.
    pub fn push_stderr(&mut self, text: &str) -> Vec<FramerEvent> {
        match self.state {
            FramerState::Stopped => Vec::new(),
            FramerState::ExecutingSilent => {
                debug!("Swallowing {} bytes of silent stderr: {:?}", text.len(), text);
                Vec::new()
            }
            _ if text.is_empty() => Vec::new(),
            _ => vec![FramerEvent::Error(text.to_string())],
        }
    }

    fn process_stdout(&mut self, text: &str, events: &mut Vec<FramerEvent>) {
        if self.state == FramerState::Stopped {
            return;
        }

        let text = if std::mem::take(&mut self.swallow_space) {
            text.strip_prefix(' ').unwrap_or(text)
        } else {
            text
        };
        if text.is_empty() {
            return;
        }

        if self.state == FramerState::ExecutingSilent {
            self.process_silent(text, events);
            return;
        }

        if let Some(index) = text.rfind(FORM_FEED) {
            debug!("Form feed in output, clearing console");
            events.push(FramerEvent::Clear);
            self.pending.clear();
            self.lookback.clear();
            self.echo = None;

            let rest = &text[index + FORM_FEED.len_utf8()..];
            if rest.is_empty() {
                events.push(FramerEvent::Prompt);
            } else {
                self.process_stdout(rest, events);
            }
            return;
        }

        match self.state {
            FramerState::AwaitingFirstPrompt => {
                self.lookback.push_str(text);
                let ready = self.find_prompt(&self.lookback);
                self.display(text, events);

                match ready {
                    Some(swallow_space) => {
                        debug!("First prompt detected, interpreter ready");
                        self.lookback.clear();
                        self.swallow_space |= swallow_space;
                        self.state = FramerState::Idle;
                        events.push(FramerEvent::Ready);
                    }
                    None => self.trim_lookback(),
                }
            }
            FramerState::ExecutingVisible => {
                if self.display(text, events) {
                    self.finish_current(events);
                }
            }
            FramerState::Idle => {
                self.display(text, events);
            }
            FramerState::ExecutingSilent | FramerState::Stopped => {}
        }
    }

    fn process_silent(&mut self, text: &str, events: &mut Vec<FramerEvent>) {
        debug!("Swallowing {} bytes of silent stdout", text.len());
        self.lookback.push_str(text);

        match self.find_prompt(&self.lookback) {
            Some(swallow_space) => {
                self.swallow_space = swallow_space;
                self.finish_current(events);
            }
            None => self.trim_lookback(),
        }
    }

    fn finish_current(&mut self, events: &mut Vec<FramerEvent>) {
        self.state = FramerState::Idle;
        self.echo = None;
        self.lookback.clear();
        if let Some(command) = self.current.take() {
            debug!("Command finished: {:?}", command.text);
            events.push(FramerEvent::CommandFinished(command.text));
        }
    }

    /// Buffer display text and release what is complete.
    ///
    /// Returns whether a trailing prompt was stripped from the released text.
    fn display(&mut self, text: &str, events: &mut Vec<FramerEvent>) -> bool {
        self.pending.push_str(text);
        if self.awaiting_echo() {
            return false;
        }

        let release = if self.trailing_prompt_len(&self.pending).is_some() {
            self.pending.len()
        } else {
            match self.pending.rfind('\n') {
                Some(index) => index + 1,
                None => return false,
            }
        };

        let mut released: String = self.pending.drain(..release).collect();

        let mut had_prompt = false;
        while let Some(len) = self.trailing_prompt_len(&released) {
            if !had_prompt {
                // Only the outermost marker can be followed by its space
                self.swallow_space = len == self.bare_prompt.len() && len != self.prompt.len();
            }
            released.truncate(released.len() - len);
            had_prompt = true;
        }

        if let Some(stripped) = self.strip_echo(&released) {
            released = stripped;
        }

        if !released.is_empty() {
            events.push(FramerEvent::Output(released));
        }
        if had_prompt {
            events.push(FramerEvent::Prompt);
        }
        had_prompt
    }

    /// Whether the held text is a leading prompt that may still grow into
    /// the command's echo. A marker there does not complete the command.
    fn awaiting_echo(&self) -> bool {
        let Some(command) = self.echo.as_deref().filter(|c| !c.is_empty()) else {
            return false;
        };
        let held = self.pending.trim_start_matches('\n');
        !held.is_empty()
            && held.len() < self.prompt.len() + command.len()
            && held.starts_with(self.bare_prompt.as_str())
            && format!("{}{}", self.prompt, command).starts_with(held)
    }

    /// Remove the echoed command from the first released text with content.
    fn strip_echo(&mut self, released: &str) -> Option<String> {
        let command = self.echo.as_deref()?;
        let trimmed = released.trim_start_matches('\n');
        if trimmed.is_empty() {
            return None;
        }

        let command = command.to_string();
        self.echo = None;
        if command.is_empty() {
            return None;
        }

        let with_prompt = format!("{}{}", self.prompt, command);
        let rest = trimmed
            .strip_prefix(with_prompt.as_str())
            .or_else(|| trimmed.strip_prefix(command.as_str()))?;

        debug!("Stripped command echo");
        Some(rest.strip_prefix('\n').unwrap_or(rest).to_string())
    }

    /// Length of the prompt marker ending `text`, if any.
    ///
    /// The bare marker only counts at the start of a line, so output such
    /// as `<environment>` split before its newline is not taken for a prompt.
    fn trailing_prompt_len(&self, text: &str) -> Option<usize> {
        if text.ends_with(self.prompt.as_str()) {
            return Some(self.prompt.len());
        }
        if self.bare_prompt_ends_line(text) {
            return Some(self.bare_prompt.len());
        }
        None
    }

    /// Whether `text` holds a prompt anywhere. The flag tells whether it was
    /// a bare trailing marker whose space may still be in flight.
    fn find_prompt(&self, text: &str) -> Option<bool> {
        if text.contains(self.prompt.as_str()) {
            Some(false)
        } else if self.bare_prompt_ends_line(text) {
            Some(self.bare_prompt.len() != self.prompt.len())
        } else {
            None
        }
    }

    fn bare_prompt_ends_line(&self, text: &str) -> bool {
        match text.strip_suffix(self.bare_prompt.as_str()) {
            Some(before) => before.is_empty() || before.ends_with('\n'),
            None => false,
        }
    }

    /// Keep only as much of the lookback as a split marker could need.
    fn trim_lookback(&mut self) {
        let keep = self.prompt.chars().count();
        let total = self.lookback.chars().count();
        if total > keep {
            let cut = self
                .lookback
                .char_indices()
                .nth(total - keep)
                .map(|(index, _)| index)
                .unwrap_or(0);
            self.lookback.drain(..cut);
        }
    }

    fn clear_buffers(&mut self) {
        self.pending.clear();
        self.lookback.clear();
        self.echo = None;
        self.swallow_space = false;
    }
}
