//! Command-line interface definition for bodhi-chat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for one-shot and interactive chat, conversation
//! management and chat settings.

use clap::{Parser, Subcommand};

/// bodhi-chat - chat with an OpenAI-compatible LLM server
///
/// Streams answers from a local Bodhi (or any OpenAI-compatible) server and
/// keeps a persisted history of conversations.
#[derive(Parser, Debug, Clone)]
#[command(name = "bodhi-chat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the server base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Override the SQLite database location
    #[arg(long, global = true)]
    pub store_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for bodhi-chat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Send one message in the current conversation and print the reply
    Ask {
        /// Message to send
        prompt: String,

        /// Model to use for this request
        #[arg(short, long)]
        model: Option<String>,

        /// Request a single JSON response instead of a stream
        #[arg(long)]
        no_stream: bool,
    },

    /// Start an interactive chat session
    Chat {
        /// Model to use for this session
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage stored conversations
    Chats {
        /// Conversation management subcommand
        #[command(subcommand)]
        command: ChatsCommand,
    },

    /// Show or change chat settings
    Settings {
        /// Settings subcommand
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

/// Conversation management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ChatsCommand {
    /// List conversations, most recently updated first
    List,

    /// Show the messages of a conversation
    Show {
        /// Conversation id or unique prefix
        id: String,
    },

    /// Make an empty conversation current
    New,

    /// Make a conversation current
    Switch {
        /// Conversation id or unique prefix
        id: String,
    },

    /// Delete a conversation
    Delete {
        /// Conversation id or unique prefix
        id: String,
    },

    /// Delete every conversation
    Clear,
}

/// Chat settings subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Print the current settings
    Show,

    /// Change one setting
    Set {
        /// Setting name (model, stream, system_prompt, temperature, top_p,
        /// max_tokens, stop, frequency_penalty, presence_penalty)
        name: String,

        /// New value; empty clears optional settings
        value: String,
    },

    /// Restore default settings
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
