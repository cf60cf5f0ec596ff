//! Console transcript model.
//!
//! Consumes session events and keeps what a console widget would show: a
//! list of styled segments plus the position where user input starts.

use qide_core::SessionEvent;

/// Style of a transcript segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Interpreter output
    Output,
    /// Interpreter error output or a session error
    Error,
    /// Rendered prompt
    Prompt,
    /// Lifecycle notice such as the exit description
    Notice,
    /// Text typed by the user
    Input,
}

/// A run of text with one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Style
    pub kind: SegmentKind,
    /// Text
    pub text: String,
}

impl Segment {
    fn new(kind: SegmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// What applying an event did to the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleChange {
    /// A segment was appended
    Appended(Segment),
    /// The transcript was emptied
    Cleared,
    /// Nothing to show
    Unchanged,
}

/// Transcript of one console.
#[derive(Debug, Clone)]
pub struct ConsoleView {
    prompt: String,
    segments: Vec<Segment>,
    input_start: usize,
}

impl ConsoleView {
    /// Create an empty console rendering `prompt` for prompt events.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            segments: Vec::new(),
            input_start: 0,
        }
    }

    /// Apply a session event.
    pub fn apply(&mut self, event: &SessionEvent) -> ConsoleChange {
        match event {
            SessionEvent::Output(text) => self.append_line(SegmentKind::Output, text),
            SessionEvent::Error(text) => self.append_line(SegmentKind::Error, text),
            SessionEvent::Prompt => {
                let change = self.append(Segment::new(SegmentKind::Prompt, self.prompt.clone()));
                self.input_start = self.len();
                change
            }
            SessionEvent::Clear => {
                self.segments.clear();
                self.input_start = 0;
                ConsoleChange::Cleared
            }
            SessionEvent::Finished(exit) => {
                self.append_line(SegmentKind::Notice, &exit.to_string())
            }
            SessionEvent::Started | SessionEvent::CommandFinished(_) => ConsoleChange::Unchanged,
        }
    }

    /// Record text typed at the prompt.
    pub fn echo_input(&mut self, text: &str) -> ConsoleChange {
        self.append_line(SegmentKind::Input, text)
    }

    /// All segments, oldest first.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Character offset where input after the last prompt starts.
    pub fn input_start(&self) -> usize {
        self.input_start
    }

    /// Transcript length in characters.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.text.chars().count()).sum()
    }

    /// Whether the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The transcript without styling.
    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    fn append_line(&mut self, kind: SegmentKind, text: &str) -> ConsoleChange {
        if text.is_empty() {
            return ConsoleChange::Unchanged;
        }
        let mut text = text.to_string();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        self.append(Segment::new(kind, text))
    }

    fn append(&mut self, segment: Segment) -> ConsoleChange {
        self.segments.push(segment.clone());
        ConsoleChange::Appended(segment)
    }
}

impl Default for ConsoleView {
    fn default() -> Self {
        Self::new("> ")
    }
}
