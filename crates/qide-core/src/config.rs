//! Configuration types for the Q IDE console engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// IDE configuration loaded from a YAML file.
///
/// Built once by the application root and passed by reference to the
/// components that need it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdeConfig {
    /// Interpreter launch and framing settings
    pub interpreter: InterpreterSettings,
    /// Environment pane settings
    pub environment: EnvironmentSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl IdeConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: IdeConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        self.interpreter.validate()
    }
}

/// Interpreter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InterpreterSettings {
    /// Program name looked up on PATH
    pub program: String,
    /// Explicit executable path; skips the search when it exists
    pub executable: Option<PathBuf>,
    /// Launch arguments
    pub args: Vec<String>,
    /// Extra install locations checked after the built-in ones
    pub search_paths: Vec<PathBuf>,
    /// Command written to stdin to ask the interpreter to exit
    pub quit_command: String,
    /// How long `stop` waits for a graceful exit before killing
    pub terminate_timeout_ms: u64,
    /// Prompt marker the interpreter prints when it is ready for input
    pub prompt: String,
    /// Value forced into LANG and LC_ALL (None keeps the inherited locale)
    pub locale: Option<String>,
    /// Working directory for the interpreter process
    pub working_directory: Option<PathBuf>,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            program: "R".to_string(),
            executable: None,
            args: vec![
                "--interactive".to_string(),
                "--no-save".to_string(),
                "--no-restore".to_string(),
            ],
            search_paths: vec![],
            quit_command: "q(save='no')".to_string(),
            terminate_timeout_ms: 3000,
            prompt: "> ".to_string(),
            locale: Some("en_US.UTF-8".to_string()),
            working_directory: None,
        }
    }
}

impl InterpreterSettings {
    /// Validate interpreter settings.
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() && self.executable.is_none() {
            return Err(Error::Config(
                "interpreter.program must not be empty".to_string(),
            ));
        }

        if self.prompt.trim().is_empty() {
            return Err(Error::Config(
                "interpreter.prompt must contain a visible character".to_string(),
            ));
        }

        if self.terminate_timeout_ms == 0 {
            return Err(Error::Config(
                "interpreter.terminate_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Environment pane settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnvironmentSettings {
    /// File the helper package rewrites whenever the global environment changes
    pub snapshot_path: PathBuf,
    /// Name of the R helper package providing `update_env` and `init_monitor`
    pub helper_package: String,
    /// Generate a startup profile that loads the helper package
    pub install_profile: bool,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            snapshot_path: std::env::temp_dir().join("q_env.json"),
            helper_package: "qide".to_string(),
            install_profile: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
