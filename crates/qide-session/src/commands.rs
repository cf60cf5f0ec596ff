//! R source for editor and environment pane actions.
//!
//! Housekeeping commands are silent so they never clutter the console;
//! anything the user asked to see is visible.

use std::path::Path;

use qide_core::PendingCommand;

/// Paragraph separator some editors use for line breaks in a selection.
const PARAGRAPH_SEPARATOR: char = '\u{2029}';

/// Builds R commands that call into the helper package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RCommands {
    helper: String,
}

impl RCommands {
    /// Commands for the given helper package.
    pub fn new(helper: impl Into<String>) -> Self {
        Self {
            helper: helper.into(),
        }
    }

    /// Ask the helper to rewrite the environment snapshot.
    pub fn refresh_environment(&self) -> PendingCommand {
        PendingCommand::silent(self.update_env())
    }

    /// Remove the named globals that exist, then refresh the snapshot.
    /// Returns `None` for an empty selection.
    pub fn remove_variables<S: AsRef<str>>(&self, names: &[S]) -> Option<PendingCommand> {
        if names.is_empty() {
            return None;
        }

        let quoted: Vec<String> = names
            .iter()
            .map(|name| r_double_quoted(name.as_ref()))
            .collect();

        Some(PendingCommand::silent(format!(
            "invisible(local({{ \
             to_remove <- c({}); \
             to_remove <- to_remove[to_remove %in% ls(envir = .GlobalEnv)]; \
             if (length(to_remove) > 0) rm(list = to_remove, envir = .GlobalEnv); \
             {}; \
             }}))",
            quoted.join(", "),
            self.update_env()
        )))
    }

    /// Remove every global, then refresh the snapshot.
    pub fn clear_environment(&self) -> PendingCommand {
        PendingCommand::silent(format!(
            "invisible({{ rm(list = ls(envir = .GlobalEnv), envir = .GlobalEnv); {} }})",
            self.update_env()
        ))
    }

    /// Start the helper's environment monitor writing to `snapshot`.
    pub fn init_monitor(&self, snapshot: &Path) -> PendingCommand {
        PendingCommand::silent(format!(
            "if (requireNamespace('{helper}', quietly=TRUE)) {helper}::init_monitor('{}')",
            r_path(snapshot),
            helper = self.helper
        ))
    }

    /// Run the garbage collector and show its report.
    pub fn collect_garbage(&self) -> PendingCommand {
        PendingCommand::visible("gc()")
    }

    /// Source a script file.
    pub fn source_file(&self, path: &Path) -> PendingCommand {
        PendingCommand::visible(format!("source('{}')", r_path(path)))
    }

    /// Change the interpreter's working directory.
    pub fn set_working_directory(&self, path: &Path) -> PendingCommand {
        PendingCommand::visible(format!("setwd('{}')", r_path(path)))
    }

    /// Run text selected in an editor.
    pub fn run_selection(&self, selection: &str) -> PendingCommand {
        PendingCommand::visible(selection.replace(PARAGRAPH_SEPARATOR, "\n"))
    }

    fn update_env(&self) -> String {
        format!(
            "if (requireNamespace('{helper}', quietly=TRUE)) {helper}::update_env()",
            helper = self.helper
        )
    }
}

impl Default for RCommands {
    fn default() -> Self {
        Self::new("qide")
    }
}

/// Path as a single-quoted R string body: forward slashes, quotes escaped.
fn r_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace('\'', "\\'")
}

fn r_double_quoted(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
