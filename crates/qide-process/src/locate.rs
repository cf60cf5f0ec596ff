//! Interpreter executable lookup.
//!
//! Search order: the configured override, then a PATH lookup of the program
//! name, then the platform's well-known install locations, then any extra
//! paths from configuration. A candidate is only accepted if it exists.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use qide_core::{Error, InterpreterSettings, Result};

lazy_static! {
    /// Versioned install directory under the Windows R root, e.g. `R-4.3.2`.
    static ref VERSION_DIR: Regex = Regex::new(r"^R-(\d+)\.(\d+)\.(\d+)$").unwrap();
}

/// Finds the interpreter executable.
#[derive(Debug, Clone)]
pub struct ExecutableLocator {
    program: String,
    override_path: Option<PathBuf>,
    extra_paths: Vec<PathBuf>,
}

impl ExecutableLocator {
    /// Create a locator for a program name looked up on PATH.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            override_path: None,
            extra_paths: Vec::new(),
        }
    }

    /// Build a locator from interpreter settings.
    pub fn from_settings(settings: &InterpreterSettings) -> Self {
        Self {
            program: settings.program.clone(),
            override_path: settings.executable.clone(),
            extra_paths: settings.search_paths.clone(),
        }
    }

    /// Prefer an explicit path over the search.
    pub fn with_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    /// Add an install location checked after the built-in ones.
    pub fn with_extra_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_paths.push(path.into());
        self
    }

    /// Locate the executable. First match wins.
    pub fn locate(&self) -> Result<PathBuf> {
        if let Some(path) = &self.override_path {
            if path.is_file() {
                info!("Using configured interpreter: {}", path.display());
                return Ok(path.clone());
            }
            warn!(
                "Configured interpreter {} does not exist, searching instead",
                path.display()
            );
        }

        if !self.program.is_empty() {
            match which::which(&self.program) {
                Ok(path) => {
                    info!("Found interpreter on PATH: {}", path.display());
                    return Ok(path);
                }
                Err(e) => debug!("'{}' not on PATH: {}", self.program, e),
            }
        }

        let found = well_known_paths()
            .into_iter()
            .chain(self.extra_paths.iter().cloned())
            .find(|candidate| {
                debug!("Checking {}", candidate.display());
                candidate.is_file()
            });

        match found {
            Some(path) => {
                info!("Found interpreter at {}", path.display());
                Ok(path)
            }
            None => {
                warn!("R executable not found");
                Err(Error::ExecutableNotFound)
            }
        }
    }
}

/// Platform-specific install locations, in search order.
pub fn well_known_paths() -> Vec<PathBuf> {
    if cfg!(windows) {
        let root = Path::new("C:/Program Files/R");
        let mut paths = installed_versions(root)
            .into_iter()
            .map(|dir| dir.join("bin/x64/R.exe"))
            .collect::<Vec<_>>();
        for version in ["R-4.3.2", "R-4.3.1", "R-4.2.3"] {
            let path = root.join(version).join("bin/x64/R.exe");
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    } else {
        vec![
            PathBuf::from("/usr/bin/R"),
            PathBuf::from("/usr/local/bin/R"),
            PathBuf::from("/opt/R/bin/R"),
        ]
    }
}

/// Versioned install directories under `root`, newest first.
pub fn installed_versions(root: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut versions: Vec<((u32, u32, u32), PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let caps = VERSION_DIR.captures(&name)?;
            let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
            Some(((part(1)?, part(2)?, part(3)?), entry.path()))
        })
        .collect();

    versions.sort_by(|a, b| b.0.cmp(&a.0));
    versions.into_iter().map(|(_, path)| path).collect()
}
