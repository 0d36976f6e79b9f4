//! Slash-command parser for the interactive chat
//!
//! Lines starting with `/` control the client instead of being sent as
//! messages. Command names are case-insensitive; session ids are passed
//! through as typed.

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
    /// Start a new session and switch to it
    New,
    /// Show the session list
    List,
    /// Switch to an existing session
    Open(String),
    /// Delete a session
    Delete(String),
    /// Display help information
    Help,
    /// Leave the chat
    Exit,
    /// Not a command; send the line as a message
    None,
}

fn required_arg(command: &str, rest: &str, usage: &str) -> Result<String, CommandError> {
    let arg = rest.trim();
    if arg.is_empty() {
        return Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        });
    }
    Ok(arg.to_string())
}

/// Parse user input into a special command
///
/// # Examples
///
/// ```
/// use parley::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/new").unwrap(), SpecialCommand::New);
/// assert_eq!(
///     parse_special_command("/open 01HX").unwrap(),
///     SpecialCommand::Open("01HX".to_string())
/// );
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_lowercase(), rest),
        None => (lower.clone(), ""),
    };

    match name.as_str() {
        "/new" => Ok(SpecialCommand::New),
        "/list" | "/sessions" => Ok(SpecialCommand::List),
        "/open" => required_arg("/open", rest, "/open <session-id>").map(SpecialCommand::Open),
        "/delete" => {
            required_arg("/delete", rest, "/delete <session-id>").map(SpecialCommand::Delete)
        }
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/quit" | "/exit" | "exit" | "quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print help for the special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

SESSIONS:
  /new              - Start a new session
  /list             - List sessions, most recently updated first
  /open <id>        - Switch to an existing session
  /delete <id>      - Delete a session

OTHER:
  /help             - Show this help message
  /quit, exit       - Leave the chat

Anything else is sent as a message to the active session.
"#
    );
}
