use crate::cli::ChatsCommand;
use crate::completion::Role;
use crate::config::Config;
use crate::error::Result;
use crate::storage::{KeyValueStore, SqliteStore};
use crate::store::{Chat, ChatStore, DeleteOutcome, StoreOptions};
use colored::Colorize;
use prettytable::{format, Table};

const TITLE_WIDTH: usize = 40;

/// Handle `chats` subcommands
pub async fn handle_chats(config: &Config, command: ChatsCommand) -> Result<()> {
    let backend = SqliteStore::from_config(&config.storage)?;
    let mut store = ChatStore::load(backend, StoreOptions::from(&config.chat)).await;

    match command {
        ChatsCommand::List => print_chat_table(&store),
        ChatsCommand::Show { id } => {
            let chat = store.find_by_prefix(&id)?;
            println!("\n{} ({})", chat.title.bold(), chat.id.cyan());
            print_messages(chat);
        }
        ChatsCommand::New => {
            let chat = store.create_new_chat().await;
            println!("{}", format!("Current chat is now {}", chat.id).green());
        }
        ChatsCommand::Switch { id } => {
            let id = store.find_by_prefix(&id)?.id.clone();
            store.set_current_chat_id(&id).await?;
            println!("{}", format!("Switched to chat {}", id).green());
        }
        ChatsCommand::Delete { id } => {
            let id = store.find_by_prefix(&id)?.id.clone();
            if let Some(outcome) = store.delete_chat(&id).await {
                println!("{}", deletion_message(&id, outcome).green());
            }
        }
        ChatsCommand::Clear => {
            let count = store.len();
            store.clear_chats().await;
            println!("{}", format!("Deleted {} chats", count).green());
        }
    }

    Ok(())
}

/// Print conversations as a table, marking the current one
pub fn print_chat_table<S: KeyValueStore>(store: &ChatStore<S>) {
    if store.is_empty() {
        println!("{}", "No chats found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "".bold(),
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    let current = store.current_chat_id();
    for chat in store.chats() {
        let marker = if current == Some(chat.id.as_str()) {
            "*"
        } else {
            ""
        };
        let updated = chat
            .updated_at
            .unwrap_or(chat.created_at)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        table.add_row(prettytable::row![
            marker.green(),
            chat.short_id().cyan(),
            truncate_title(&chat.title),
            chat.messages.len(),
            updated
        ]);
    }

    println!("\nChats:");
    table.printstd();
    println!();
    println!(
        "Use {} to continue a chat.",
        "bodhi-chat chats switch <ID>".cyan()
    );
    println!();
}

/// Print the messages of one conversation
pub fn print_messages(chat: &Chat) {
    if chat.is_empty() {
        println!("{}", "(no messages)".dimmed());
        return;
    }
    for message in &chat.messages {
        let label = match message.role {
            Role::User => "user".blue().bold(),
            Role::Assistant => "assistant".green().bold(),
            Role::System => "system".magenta().bold(),
        };
        println!("\n{}: {}", label, message.content);
        if let Some(model) = message.metadata.as_ref().and_then(|m| m.model.as_deref()) {
            println!("{}", format!("  [{}]", model).dimmed());
        }
    }
    println!();
}

/// Status line for a finished `delete_chat`
pub fn deletion_message(id: &str, outcome: DeleteOutcome) -> String {
    match outcome {
        DeleteOutcome::Removed => format!("Deleted chat {}", id),
        DeleteOutcome::Reset => format!("Reset current chat {}", id),
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_WIDTH {
        let head: String = title.chars().take(TITLE_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_title_short_unchanged() {
        assert_eq!(truncate_title("New Chat"), "New Chat");
    }

    #[test]
    fn test_truncate_title_long_multibyte() {
        let title = "é".repeat(50);
        let truncated = truncate_title(&title);
        assert_eq!(truncated.chars().count(), TITLE_WIDTH);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_deletion_message_names_the_path_taken() {
        assert_eq!(
            deletion_message("abc", DeleteOutcome::Removed),
            "Deleted chat abc"
        );
        assert_eq!(
            deletion_message("abc", DeleteOutcome::Reset),
            "Reset current chat abc"
        );
    }
}
