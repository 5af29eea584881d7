//! Special commands parser for interactive chat mode
//!
//! Special commands manage the conversation view instead of being sent to
//! the answer service:
//! - Start a new chat or load a previous one
//! - List recent chats
//! - Show usage against the free-tier quota
//! - Attach a file (premium)
//! - Sign out, show help, or exit
//!
//! Commands are prefixed with `/` and are case-insensitive; arguments keep
//! their case.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Open a fresh chat session
    NewChat,

    /// Switch the view to a previous session
    ///
    /// Accepts a full session id or a unique prefix of one from `/history`.
    LoadChat(String),

    /// List recent chat sessions
    History,

    /// Show message usage and tier
    Usage,

    /// Attach a file to the next question
    Attach,

    /// Sign out of the current identity
    SignOut,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be submitted as a question.
    None,
}

/// Parse user input into a special command
///
/// # Errors
///
/// Returns `CommandError` for unknown commands or missing arguments.
///
/// # Examples
///
/// ```
/// use askgenie::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/new").unwrap(), SpecialCommand::NewChat);
/// assert_eq!(
///     parse_special_command("/load 3f2a").unwrap(),
///     SpecialCommand::LoadChat("3f2a".to_string())
/// );
/// assert_eq!(
///     parse_special_command("What is Rust?").unwrap(),
///     SpecialCommand::None
/// );
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match command.as_str() {
        "/new" => Ok(SpecialCommand::NewChat),
        "/load" => match arg {
            Some(id) => Ok(SpecialCommand::LoadChat(id.to_string())),
            None => Err(CommandError::MissingArgument {
                command: "/load".to_string(),
                usage: "/load <session_id>".to_string(),
            }),
        },
        "/history" | "/chats" => Ok(SpecialCommand::History),
        "/usage" => Ok(SpecialCommand::Usage),
        "/attach" => Ok(SpecialCommand::Attach),
        "/signout" | "/logout" => Ok(SpecialCommand::SignOut),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" | "exit" | "quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Display help information for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

CHATS:
  /new            - Start a new chat
  /load <id>      - Open a previous chat (id or unique prefix)
  /history        - List recent chats
  /chats          - Same as /history

ACCOUNT:
  /usage          - Show messages used and remaining
  /attach         - Attach a file (premium only)
  /signout        - Sign out

SESSION CONTROL:
  /help           - Show this help message
  /?              - Same as /help
  exit            - Exit interactive mode
  quit            - Same as exit

NOTES:
  - Commands are case-insensitive
  - Regular text (not starting with /) is sent as a question
  - Answers list their video and web sources below the text
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new() {
        assert_eq!(parse_special_command("/new"), Ok(SpecialCommand::NewChat));
    }

    #[test]
    fn test_parse_load_keeps_argument_case() {
        assert_eq!(
            parse_special_command("/LOAD AbC-123"),
            Ok(SpecialCommand::LoadChat("AbC-123".to_string()))
        );
    }

    #[test]
    fn test_parse_load_without_id() {
        assert!(matches!(
            parse_special_command("/load   "),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_parse_history_aliases() {
        assert_eq!(parse_special_command("/history"), Ok(SpecialCommand::History));
        assert_eq!(parse_special_command("/chats"), Ok(SpecialCommand::History));
    }

    #[test]
    fn test_parse_account_commands() {
        assert_eq!(parse_special_command("/usage"), Ok(SpecialCommand::Usage));
        assert_eq!(parse_special_command("/attach"), Ok(SpecialCommand::Attach));
        assert_eq!(parse_special_command("/logout"), Ok(SpecialCommand::SignOut));
    }

    #[test]
    fn test_parse_exit_variants() {
        for input in ["exit", "QUIT", "/exit", "/quit"] {
            assert_eq!(parse_special_command(input), Ok(SpecialCommand::Exit));
        }
    }

    #[test]
    fn test_parse_help_shorthand() {
        assert_eq!(parse_special_command("/?"), Ok(SpecialCommand::Help));
    }

    #[test]
    fn test_parse_regular_text_returns_none() {
        assert_eq!(
            parse_special_command("how do I exit vim?"),
            Ok(SpecialCommand::None)
        );
        assert_eq!(parse_special_command("   "), Ok(SpecialCommand::None));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            parse_special_command("/mode write"),
            Err(CommandError::UnknownCommand("/mode write".to_string()))
        );
    }
}
