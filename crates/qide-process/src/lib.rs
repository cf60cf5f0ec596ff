//! # qide-process
//!
//! Interpreter process handling for the Q IDE console engine.
//!
//! This crate provides:
//! - Interpreter executable lookup (PATH, then well-known install locations)
//! - Process lifecycle: spawn with piped stdio, line writes, graceful terminate
//! - Stateful ANSI escape filtering for the output streams
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on qide-core and is
//! driven by the session controller in qide-session.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod filter;
pub mod locate;
pub mod process;

// Re-export commonly used types
pub use filter::{strip_ansi, AnsiFilter};
pub use locate::ExecutableLocator;
pub use process::{InterpreterProcess, LaunchSpec, ProcessEvent};
