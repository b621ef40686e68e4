use crate::cli::SettingsCommand;
use crate::config::Config;
use crate::error::Result;
use crate::settings::ChatSettings;
use crate::storage::SqliteStore;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle `settings` subcommands
pub async fn handle_settings(config: &Config, command: SettingsCommand) -> Result<()> {
    let backend = SqliteStore::from_config(&config.storage)?;

    match command {
        SettingsCommand::Show => {
            let settings = ChatSettings::load(&backend).await;
            print_settings(&settings);
        }
        SettingsCommand::Set { name, value } => {
            let mut settings = ChatSettings::load(&backend).await;
            settings.set_field(&name, &value)?;
            settings.validate()?;
            settings.save(&backend).await?;
            println!("{}", format!("Updated {}", name).green());
        }
        SettingsCommand::Reset => {
            ChatSettings::reset(&backend).await?;
            println!("{}", "Settings restored to defaults".green());
        }
    }

    Ok(())
}

/// Print settings as a two-column table
pub fn print_settings(settings: &ChatSettings) {
    fn show<T: ToString>(value: Option<T>) -> String {
        value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row!["Setting".bold(), "Value".bold()]);

    let model = if settings.model.is_empty() {
        "-".to_string()
    } else {
        settings.model.clone()
    };
    let stop = if settings.stop.is_empty() {
        "-".to_string()
    } else {
        settings.stop.join(", ")
    };

    table.add_row(prettytable::row!["model", model.cyan()]);
    table.add_row(prettytable::row!["stream", settings.stream]);
    table.add_row(prettytable::row![
        "system_prompt",
        show(settings.system_prompt.as_deref())
    ]);
    table.add_row(prettytable::row!["temperature", show(settings.temperature)]);
    table.add_row(prettytable::row!["top_p", show(settings.top_p)]);
    table.add_row(prettytable::row!["max_tokens", show(settings.max_tokens)]);
    table.add_row(prettytable::row!["stop", stop]);
    table.add_row(prettytable::row![
        "frequency_penalty",
        show(settings.frequency_penalty)
    ]);
    table.add_row(prettytable::row![
        "presence_penalty",
        show(settings.presence_penalty)
    ]);

    println!();
    table.printstd();
    println!();
}
