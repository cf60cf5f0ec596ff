//! Per-process R startup profile.
//!
//! R reads the file named by `R_PROFILE_USER` at startup. The generated
//! profile first runs the user's own profile, then loads the helper package
//! and starts its environment monitor, so the environment pane gets
//! snapshots without any visible command in the console.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use qide_core::{EnvironmentSettings, Result};

/// Variable R reads its user profile path from.
pub const PROFILE_VAR: &str = "R_PROFILE_USER";

/// Variable carrying the user's own profile path into the generated one.
pub const ORIGINAL_PROFILE_VAR: &str = "Q_ORIGINAL_R_PROFILE_USER";

/// Startup profile for one interpreter process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupProfile {
    helper: String,
    snapshot_path: PathBuf,
}

impl StartupProfile {
    /// Profile loading `helper` and monitoring into `snapshot_path`.
    pub fn new(helper: impl Into<String>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
            snapshot_path: snapshot_path.into(),
        }
    }

    /// Profile for the configured environment pane.
    pub fn from_settings(settings: &EnvironmentSettings) -> Self {
        Self::new(&settings.helper_package, &settings.snapshot_path)
    }

    /// R source of the profile.
    pub fn render(&self) -> String {
        let snapshot = self
            .snapshot_path
            .to_string_lossy()
            .replace('\\', "/")
            .replace('\'', "\\'");

        format!(
            "local({{\n\
             \x20 orig_prof <- Sys.getenv('{ORIGINAL_PROFILE_VAR}')\n\
             \x20 if (nzchar(orig_prof) && file.exists(orig_prof)) {{\n\
             \x20   source(orig_prof)\n\
             \x20 }} else {{\n\
             \x20   if (file.exists('.Rprofile')) source('.Rprofile')\n\
             \x20   else if (file.exists(file.path(Sys.getenv('HOME'), '.Rprofile'))) \
             source(file.path(Sys.getenv('HOME'), '.Rprofile'))\n\
             \x20 }}\n\
             \x20 if (requireNamespace('{helper}', quietly=TRUE)) {{\n\
             \x20   library({helper})\n\
             \x20   {helper}::init_monitor('{snapshot}')\n\
             \x20 }}\n\
             }})\n",
            helper = self.helper,
        )
    }

    /// Default location: one file per host process in the temp dir.
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(format!("q_init_{}.R", std::process::id()))
    }

    /// Write the profile to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())?;
        debug!("Wrote startup profile to {}", path.display());
        Ok(())
    }

    /// Write the profile to its default location and return the environment
    /// variables that make R load it.
    ///
    /// A user profile configured through `R_PROFILE_USER` is passed on so
    /// the generated profile can still run it.
    pub fn install(&self) -> Result<Vec<(String, String)>> {
        let path = Self::default_path();
        self.write_to(&path)?;
        info!("Installed startup profile: {}", path.display());
        Ok(Self::launch_env(&path, std::env::var(PROFILE_VAR).ok()))
    }

    /// Environment variables pointing R at `script`.
    pub fn launch_env(script: &Path, original: Option<String>) -> Vec<(String, String)> {
        let mut env = Vec::with_capacity(2);
        if let Some(original) = original.filter(|p| !p.is_empty()) {
            env.push((ORIGINAL_PROFILE_VAR.to_string(), original));
        }
        env.push((PROFILE_VAR.to_string(), script.to_string_lossy().into_owned()));
        env
    }
}
