//! ANSI escape filtering for interpreter output using the VTE crate.
//!
//! R colours warnings and prompts when a terminal-ish environment is
//! detected, and packages such as `cli` emit cursor sequences. The console
//! shows plain text, so every escape sequence is removed before framing.

use vte::{Params, Perform};

/// Collects the printable text produced by the VTE state machine.
#[derive(Debug, Default)]
struct TextSink {
    text: String,
}

impl Perform for TextSink {
    fn print(&mut self, c: char) {
        self.text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            // LF, TAB and form feed carry meaning for the console
            0x0A | 0x09 | 0x0C => self.text.push(byte as char),
            // CR, BEL, BS and the rest are dropped
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _c: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _c: char) {
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}

/// Stateful ANSI filter for one output stream.
///
/// The parser state survives between calls, so an escape sequence or a UTF-8
/// character split across two reads is still handled correctly. Use one
/// filter per stream.
pub struct AnsiFilter {
    parser: vte::Parser,
    sink: TextSink,
}

impl std::fmt::Debug for AnsiFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiFilter")
            .field("pending", &self.sink.text.len())
            .finish_non_exhaustive()
    }
}

impl AnsiFilter {
    /// Create a new filter in the ground state.
    pub fn new() -> Self {
        Self {
            parser: vte::Parser::new(),
            sink: TextSink::default(),
        }
    }

    /// Feed raw bytes and return the plain text they produced.
    pub fn filter(&mut self, bytes: &[u8]) -> String {
        for byte in bytes {
            self.parser.advance(&mut self.sink, *byte);
        }
        std::mem::take(&mut self.sink.text)
    }

    /// Drop any partially parsed sequence.
    pub fn reset(&mut self) {
        self.parser = vte::Parser::new();
        self.sink.text.clear();
    }
}

impl Default for AnsiFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip escape sequences from a complete piece of text.
pub fn strip_ansi(text: &str) -> String {
    AnsiFilter::new().filter(text.as_bytes())
}
