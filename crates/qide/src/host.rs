//! Console input parsing.
//!
//! Plain lines go to the interpreter. Lines starting with `:` are host
//! commands standing in for the IDE's menu and pane actions.

use std::path::PathBuf;

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// R source to run visibly
    Submit(String),
    /// Refresh and print the environment snapshot
    Env,
    /// Remove global variables
    Remove(Vec<String>),
    /// Remove all global variables
    ClearEnv,
    /// Run the garbage collector
    Gc,
    /// Source a script
    Source(PathBuf),
    /// Change the working directory
    Cd(PathBuf),
    /// Restart the interpreter
    Restart,
    /// Leave the console
    Quit,
    /// List host commands
    Help,
    /// A host command that could not be parsed
    Invalid(String),
}

/// Help text for the host commands.
pub const HELP: &str = "\
:env            show the global environment
:rm NAME...     remove variables
:clear-env      remove all variables
:gc             run the garbage collector
:source FILE    source an R script
:cd DIR         change the working directory
:restart        restart the interpreter
:quit           stop the interpreter and exit
";

impl HostCommand {
    /// Parse one input line.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix(':') else {
            return HostCommand::Submit(line.to_string());
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        match name {
            "env" => HostCommand::Env,
            "rm" if !argument.is_empty() => {
                HostCommand::Remove(argument.split_whitespace().map(str::to_string).collect())
            }
            "rm" => HostCommand::Invalid("usage: :rm NAME...".to_string()),
            "clear-env" => HostCommand::ClearEnv,
            "gc" => HostCommand::Gc,
            "source" if !argument.is_empty() => HostCommand::Source(PathBuf::from(argument)),
            "source" => HostCommand::Invalid("usage: :source FILE".to_string()),
            "cd" if !argument.is_empty() => HostCommand::Cd(PathBuf::from(argument)),
            "cd" => HostCommand::Invalid("usage: :cd DIR".to_string()),
            "restart" => HostCommand::Restart,
            "quit" | "q" => HostCommand::Quit,
            "help" | "h" => HostCommand::Help,
            other => HostCommand::Invalid(format!("unknown command :{other}, try :help")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines_are_submitted_verbatim() {
        assert_eq!(
            HostCommand::parse("  x <- c(1, 2)"),
            HostCommand::Submit("  x <- c(1, 2)".to_string())
        );
        assert_eq!(HostCommand::parse(""), HostCommand::Submit(String::new()));
    }

    #[test]
    fn test_host_commands() {
        assert_eq!(HostCommand::parse(":env"), HostCommand::Env);
        assert_eq!(HostCommand::parse(" :gc "), HostCommand::Gc);
        assert_eq!(HostCommand::parse(":clear-env"), HostCommand::ClearEnv);
        assert_eq!(HostCommand::parse(":restart"), HostCommand::Restart);
        assert_eq!(HostCommand::parse(":q"), HostCommand::Quit);
        assert_eq!(HostCommand::parse(":help"), HostCommand::Help);
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(
            HostCommand::parse(":rm x  df"),
            HostCommand::Remove(vec!["x".to_string(), "df".to_string()])
        );
        assert_eq!(
            HostCommand::parse(":source /home/me/my script.R"),
            HostCommand::Source(PathBuf::from("/home/me/my script.R"))
        );
        assert_eq!(
            HostCommand::parse(":cd ~/proj"),
            HostCommand::Cd(PathBuf::from("~/proj"))
        );
    }

    #[test]
    fn test_invalid_commands() {
        assert!(matches!(HostCommand::parse(":rm"), HostCommand::Invalid(_)));
        assert!(matches!(HostCommand::parse(":source"), HostCommand::Invalid(_)));
        assert!(matches!(HostCommand::parse(":frobnicate"), HostCommand::Invalid(m) if m.contains(":frobnicate")));
    }
}
