//! Q IDE console host library.
//!
//! The line-oriented console that drives the session controller from a
//! terminal. The binary entry point is in main.rs.

pub mod app;
pub mod host;

// Re-export commonly used types
pub use app::ConsoleApp;
pub use host::HostCommand;
