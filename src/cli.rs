//! Command-line interface definition for askgenie
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chat, history, usage and service health.

use clap::{Parser, Subcommand};

/// askgenie - Web and video answers in your terminal
///
/// Ask questions, get answers with cited web and video sources, and keep
/// every conversation as a resumable chat session.
#[derive(Parser, Debug, Clone)]
#[command(name = "askgenie")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for askgenie
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start interactive chat
    Chat {
        /// Start in a new chat instead of resuming the most recent one
        #[arg(short, long, conflicts_with = "session")]
        new: bool,

        /// Open a specific chat session by id
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Browse chat history
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Show message usage and tier
    Usage {
        /// Mark the local owner as premium (SQLite backend only)
        #[arg(long)]
        grant_premium: bool,
    },

    /// Check that the answer service is reachable
    Health,
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List recent chat sessions
    List {
        /// Maximum number of sessions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the messages of a chat session
    Show {
        /// Session id
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_chat_defaults() {
        let cli = Cli::try_parse_from(["askgenie", "chat"]).unwrap();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(!cli.json_logs);
        match cli.command {
            Commands::Chat { new, session } => {
                assert!(!new);
                assert!(session.is_none());
            }
            _ => panic!("Expected Chat command"),
        }
    }

    #[test]
    fn test_cli_parse_chat_with_session() {
        let cli = Cli::try_parse_from(["askgenie", "chat", "--session", "abc"]).unwrap();
        match cli.command {
            Commands::Chat { session, .. } => assert_eq!(session.as_deref(), Some("abc")),
            _ => panic!("Expected Chat command"),
        }
    }

    #[test]
    fn test_cli_chat_new_conflicts_with_session() {
        let result = Cli::try_parse_from(["askgenie", "chat", "--new", "--session", "abc"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_history_list_limit() {
        let cli = Cli::try_parse_from(["askgenie", "history", "list", "--limit", "5"]).unwrap();
        match cli.command {
            Commands::History {
                command: HistoryCommand::List { limit },
            } => assert_eq!(limit, Some(5)),
            _ => panic!("Expected History List command"),
        }
    }

    #[test]
    fn test_cli_parse_history_show() {
        let cli = Cli::try_parse_from(["askgenie", "history", "show", "s1"]).unwrap();
        match cli.command {
            Commands::History {
                command: HistoryCommand::Show { id },
            } => assert_eq!(id, "s1"),
            _ => panic!("Expected History Show command"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "askgenie",
            "--config",
            "custom.yaml",
            "-v",
            "--json-logs",
            "usage",
        ])
        .unwrap();
        assert_eq!(cli.config, Some("custom.yaml".to_string()));
        assert!(cli.verbose);
        assert!(cli.json_logs);
        assert!(matches!(
            cli.command,
            Commands::Usage {
                grant_premium: false
            }
        ));
    }

    #[test]
    fn test_cli_parse_usage_grant_premium() {
        let cli = Cli::try_parse_from(["askgenie", "usage", "--grant-premium"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Usage {
                grant_premium: true
            }
        ));
    }

    #[test]
    fn test_cli_missing_command_fails() {
        assert!(Cli::try_parse_from(["askgenie"]).is_err());
    }
}
