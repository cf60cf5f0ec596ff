//! # qide-core
//!
//! Core types for the Q IDE console engine.
//!
//! This crate contains the fundamental types with **no internal dependencies**
//! on other qide crates. It provides:
//!
//! - Session types (SessionId, PendingCommand, SessionState, ExitInfo, SessionEvent)
//! - Configuration loaded from YAML
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other qide crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod session;

// Re-export commonly used types
pub use config::{EnvironmentSettings, IdeConfig, InterpreterSettings, LoggingSettings};
pub use error::{Error, Result};
pub use session::{ExitInfo, PendingCommand, SessionEvent, SessionId, SessionState};
