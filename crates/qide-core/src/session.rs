//! Session types shared by the process layer, the controller and its hosts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one interpreter process lifetime.
///
/// A fresh id is minted on every `start`, so log lines from a restarted
/// interpreter can be told apart from the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A command waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommand {
    /// Source text written to the interpreter
    pub text: String,
    /// Suppress the command's output from the console
    pub silent: bool,
}

impl PendingCommand {
    /// Create a new pending command.
    pub fn new(text: impl Into<String>, silent: bool) -> Self {
        Self {
            text: text.into(),
            silent,
        }
    }

    /// A command whose output is shown in the console.
    pub fn visible(text: impl Into<String>) -> Self {
        Self::new(text, false)
    }

    /// A housekeeping command whose output is swallowed.
    pub fn silent(text: impl Into<String>) -> Self {
        Self::new(text, true)
    }
}

/// Lifecycle state of the interpreter session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// `start` has never been called
    NotStarted,
    /// Process launched, waiting for its first prompt
    AwaitingFirstPrompt,
    /// Ready for the next command
    Idle,
    /// A command is in flight
    Executing {
        /// Whether the in-flight command is silent
        silent: bool,
    },
    /// Process exited or was stopped; `start` must be called again
    Stopped,
}

impl SessionState {
    /// Whether a command is currently in flight.
    pub fn is_executing(&self) -> bool {
        matches!(self, SessionState::Executing { .. })
    }
}

/// How the interpreter process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    /// Exit code, when the process exited on its own
    pub code: Option<i32>,
    /// Terminating signal on unix
    pub signal: Option<i32>,
    /// Whether the exit is considered a crash (signal or killed)
    pub crashed: bool,
}

impl ExitInfo {
    /// A normal exit with the given code.
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
            crashed: false,
        }
    }

    /// An exit caused by a signal.
    pub fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
            crashed: true,
        }
    }

    /// Exit status could not be determined.
    pub fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
            crashed: true,
        }
    }

    /// Whether the interpreter ended cleanly with status 0.
    pub fn success(&self) -> bool {
        !self.crashed && self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::signaled(signal);
            }
        }

        Self::unknown()
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) if self.crashed => {
                write!(f, "R process crashed with exit code: {code}")
            }
            (Some(code), _) => write!(f, "R process finished with exit code: {code}"),
            (None, Some(signal)) => write!(f, "R process crashed with signal: {signal}"),
            (None, None) => write!(f, "R process crashed"),
        }
    }
}

/// Events emitted by the session controller, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The interpreter process was launched
    Started,
    /// The interpreter process ended; no output follows until the next `Started`
    Finished(ExitInfo),
    /// Text for the console (ANSI-free, echo-stripped)
    Output(String),
    /// Error text: interpreter stderr or a session failure message
    Error(String),
    /// The interpreter is waiting for input; render a prompt
    Prompt,
    /// The console should be cleared (form feed)
    Clear,
    /// The given command completed
    CommandFinished(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_creation() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new();
        assert_eq!(format!("{id}").len(), 36);
    }

    #[test]
    fn test_pending_command_constructors() {
        let cmd = PendingCommand::visible("1+1");
        assert_eq!(cmd.text, "1+1");
        assert!(!cmd.silent);

        let cmd = PendingCommand::silent("x<-5");
        assert!(cmd.silent);
    }

    #[test]
    fn test_session_state_is_executing() {
        assert!(SessionState::Executing { silent: true }.is_executing());
        assert!(SessionState::Executing { silent: false }.is_executing());
        assert!(!SessionState::Idle.is_executing());
        assert!(!SessionState::NotStarted.is_executing());
    }

    #[test]
    fn test_exit_info_display() {
        assert_eq!(
            ExitInfo::exited(0).to_string(),
            "R process finished with exit code: 0"
        );
        assert_eq!(
            ExitInfo::signaled(9).to_string(),
            "R process crashed with signal: 9"
        );
        assert_eq!(ExitInfo::unknown().to_string(), "R process crashed");
    }

    #[test]
    fn test_exit_info_success() {
        assert!(ExitInfo::exited(0).success());
        assert!(!ExitInfo::exited(1).success());
        assert!(!ExitInfo::signaled(15).success());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_info_from_status() {
        use std::os::unix::process::ExitStatusExt;

        let info = ExitInfo::from(std::process::ExitStatus::from_raw(0));
        assert_eq!(info, ExitInfo::exited(0));

        // Raw wait status 9 means "terminated by SIGKILL"
        let info = ExitInfo::from(std::process::ExitStatus::from_raw(9));
        assert_eq!(info, ExitInfo::signaled(9));
    }

    #[test]
    fn test_session_event_serialization() {
        let event = SessionEvent::CommandFinished("1+1".to_string());
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"command_finished","data":"1+1"}"#);

        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
