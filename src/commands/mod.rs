/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `ask`: send one message and print the reply
- `chat`: interactive chat mode
- `chats`: conversation management
- `settings`: chat settings management

These handlers are thin wrappers over the library components:
the completion client, the chat store and the chat session.
*/

use crate::completion::{ChatClient, CompletionEvent};
use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::session::ChatSession;
use crate::settings::ChatSettings;
use crate::storage::SqliteStore;
use crate::store::{ChatStore, StoreOptions};
use std::io::Write;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// Conversation management commands
pub mod chats;

// Chat settings commands
pub mod settings;

// Special commands parser for interactive chat
pub mod special_commands;

/// Open the persisted store, settings and client described by `config`
pub async fn open_session(config: &Config) -> Result<ChatSession<SqliteStore>> {
    let backend = SqliteStore::from_config(&config.storage)?;
    tracing::debug!("Using chat database at {}", backend.db_path().display());

    let store = ChatStore::load(backend, StoreOptions::from(&config.chat)).await;
    let settings = ChatSettings::load(store.backend()).await;
    let client = ChatClient::from_config(config)?;

    Ok(ChatSession::new(store, client, settings).with_default_model(config.chat.default_model.clone()))
}

/// Print deltas (or the single non-streaming message) to stdout as they arrive
///
/// The task ends when the sender side is dropped, i.e. when the completion
/// call returns.
fn spawn_printer() -> (mpsc::UnboundedSender<CompletionEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            match event {
                CompletionEvent::Delta(text) => {
                    let _ = write!(stdout, "{}", text);
                    let _ = stdout.flush();
                }
                CompletionEvent::Message(message) => {
                    let _ = write!(stdout, "{}", message.content);
                    let _ = stdout.flush();
                }
                CompletionEvent::State(state) => tracing::trace!("stream state: {}", state),
                CompletionEvent::Finished(_) => {}
            }
        }
    });
    (tx, handle)
}

/// Cancel `token` on Ctrl+C until the returned handle is aborted
fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Ctrl+C received, cancelling completion");
            token.cancel();
        }
    })
}

/// Send one prompt through `session`, streaming output to stdout
///
/// A cancelled completion is reported on stderr and is not an error.
async fn send_and_print(session: &mut ChatSession<SqliteStore>, prompt: &str) -> Result<()> {
    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone());
    let (tx, printer) = spawn_printer();

    let result = session.send_message(prompt, Some(tx), &cancel).await;

    watcher.abort();
    let _ = printer.await;
    println!();

    match result {
        Ok(_) => Ok(()),
        Err(e) => match e.downcast_ref::<ChatError>() {
            Some(ChatError::Cancelled { .. }) => {
                use colored::Colorize;
                eprintln!("{}", "Cancelled.".yellow());
                Ok(())
            }
            _ => Err(e),
        },
    }
}

// One-shot command handler
pub mod ask {
    //! Send a single message in the current conversation.

    use super::*;

    /// Send `prompt` and print the reply
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration
    /// * `prompt` - Message text
    /// * `model` - Optional model override for this request
    /// * `no_stream` - Request a single JSON response instead of a stream
    pub async fn run_ask(
        config: Config,
        prompt: String,
        model: Option<String>,
        no_stream: bool,
    ) -> Result<()> {
        let mut session = open_session(&config).await?;

        if let Some(model) = model {
            session.settings_mut().model = model;
        }
        if no_stream {
            session.settings_mut().stream = false;
        }
        session.settings().validate()?;

        send_and_print(&mut session, &prompt).await
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Runs a readline loop that sends each line to the server in the current
    //! conversation and streams the answer back. Lines starting with `/` are
    //! special commands.

    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `model` - Optional model override for the session
    pub async fn run_chat(config: Config, model: Option<String>) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let mut session = open_session(&config).await?;
        if let Some(model) = model {
            session.settings_mut().model = model;
        }
        session.settings().validate()?;

        if session.store().current_chat().is_none() {
            session.new_chat().await;
        }

        let mut rl = DefaultEditor::new()
            .map_err(|e| ChatError::Config(format!("Failed to initialize line editor: {}", e)))?;

        print_welcome_banner(&session);

        loop {
            match rl.readline(&format!("{} ", ">>".cyan().bold())) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::None) => {}
                        Ok(SpecialCommand::Exit) => break,
                        Ok(command) => {
                            if let Err(e) = handle_special_command(&mut session, command).await {
                                eprintln!("{}", format!("Error: {}", e).red());
                            }
                            continue;
                        }
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    }

                    let _ = rl.add_history_entry(trimmed);

                    if let Err(e) = send_and_print(&mut session, trimmed).await {
                        eprintln!("{}\n", format!("Error: {}", e).red());
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    async fn handle_special_command(
        session: &mut ChatSession<SqliteStore>,
        command: SpecialCommand,
    ) -> Result<()> {
        match command {
            SpecialCommand::Help => print_help(),
            SpecialCommand::NewChat => {
                let chat = session.new_chat().await;
                println!("Started chat {}", chat.short_id().cyan());
            }
            SpecialCommand::ListChats => chats::print_chat_table(session.store()),
            SpecialCommand::SwitchChat(prefix) => {
                let id = session.store().find_by_prefix(&prefix)?.id.clone();
                session.store_mut().set_current_chat_id(&id).await?;
                if let Some(chat) = session.store().current_chat() {
                    println!("Switched to {} ({})", chat.title.bold(), chat.short_id().cyan());
                    chats::print_messages(chat);
                }
            }
            SpecialCommand::DeleteChat(prefix) => {
                let id = session.store().find_by_prefix(&prefix)?.id.clone();
                if let Some(outcome) = session.store_mut().delete_chat(&id).await {
                    println!("{}", chats::deletion_message(&id, outcome).green());
                }
            }
            SpecialCommand::SetModel(model) => {
                session.settings_mut().model = model.clone();
                println!("Using model {}", model.cyan());
            }
            SpecialCommand::ShowSettings => settings::print_settings(session.settings()),
            SpecialCommand::Exit | SpecialCommand::None => {}
        }
        Ok(())
    }

    fn print_welcome_banner(session: &ChatSession<SqliteStore>) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║              bodhi-chat Interactive Mode                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!(
            "Model:  {}",
            session.model().unwrap_or("(not set)").cyan()
        );
        if let Some(chat) = session.store().current_chat() {
            println!(
                "Chat:   {} ({}, {} messages)",
                chat.title.bold(),
                chat.short_id(),
                chat.messages.len()
            );
        }
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }
}
