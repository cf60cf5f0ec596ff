//! # qide-session
//!
//! Interpreter session control for the Q IDE console engine.
//!
//! This crate provides:
//! - The FIFO command queue
//! - The output framer: prompt detection, echo stripping, silent commands
//! - The session controller tying queue, framer and process together
//! - A console transcript model consuming the controller's events
//! - R command builders and the environment snapshot format
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on qide-core and
//! qide-process. All state is owned by one task; nothing here locks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commands;
pub mod console;
pub mod controller;
pub mod environment;
pub mod framer;
pub mod profile;
pub mod queue;

// Re-export commonly used types
pub use commands::RCommands;
pub use console::{ConsoleChange, ConsoleView, Segment, SegmentKind};
pub use controller::SessionController;
pub use environment::{format_size, EnvEntry, EnvSnapshot};
pub use framer::{FramerEvent, FramerState, OutputFramer};
pub use profile::StartupProfile;
pub use queue::CommandQueue;
