//! Special commands parser for interactive chat mode
//!
//! Commands are prefixed with `/` and are case-insensitive; their arguments
//! (chat ids, model names) keep their original case. Plain `exit` and `quit`
//! are accepted without the slash.

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
///
/// These act on the session instead of being sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Display help information
    Help,

    /// Start (or reuse) an empty conversation
    NewChat,

    /// List stored conversations
    ListChats,

    /// Make the conversation with this id or prefix current
    SwitchChat(String),

    /// Delete the conversation with this id or prefix
    DeleteChat(String),

    /// Use another model for the rest of the session
    SetModel(String),

    /// Print the active chat settings
    ShowSettings,

    /// End the interactive session
    Exit,

    /// Input is a regular message
    None,
}

/// Parse user input into a special command
///
/// # Examples
///
/// ```
/// use bodhi_chat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/NEW"), Ok(SpecialCommand::NewChat));
/// assert_eq!(
///     parse_special_command("/switch 1a2B"),
///     Ok(SpecialCommand::SwitchChat("1a2B".to_string()))
/// );
/// assert_eq!(parse_special_command("hello"), Ok(SpecialCommand::None));
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') {
        return match lower.as_str() {
            "exit" | "quit" => Ok(SpecialCommand::Exit),
            _ => Ok(SpecialCommand::None),
        };
    }

    let (command, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((command, arg)) => (command.to_lowercase(), arg.trim()),
        None => (lower.clone(), ""),
    };

    match command.as_str() {
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/new" => Ok(SpecialCommand::NewChat),
        "/chats" => Ok(SpecialCommand::ListChats),
        "/settings" => Ok(SpecialCommand::ShowSettings),
        "/exit" | "/bye" | "/quit" => Ok(SpecialCommand::Exit),
        "/switch" => with_argument("/switch", "/switch <chat-id>", arg)
            .map(SpecialCommand::SwitchChat),
        "/delete" => with_argument("/delete", "/delete <chat-id>", arg)
            .map(SpecialCommand::DeleteChat),
        "/model" => {
            with_argument("/model", "/model <name>", arg).map(SpecialCommand::SetModel)
        }
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

fn with_argument(command: &str, usage: &str, arg: &str) -> Result<String, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        })
    } else {
        Ok(arg.to_string())
    }
}

/// Print help for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
==========================================

CONVERSATIONS:
  /new              - Start a new conversation (reuses an empty one)
  /chats            - List stored conversations
  /switch <id>      - Continue another conversation (id or 8-char prefix)
  /delete <id>      - Delete a conversation

MODEL & SETTINGS:
  /model <name>     - Use another model for this session
  /settings         - Show the active chat settings

SESSION:
  /help, /?         - Show this help
  /exit, /bye, /quit - Leave the session (also: exit, quit)

Press Ctrl+C while an answer is streaming to stop it.
"#
    );
}
