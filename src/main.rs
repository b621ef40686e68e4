//! bodhi-chat - chat with an OpenAI-compatible LLM server
//!
#![doc = "bodhi-chat - chat with an OpenAI-compatible LLM server"]
#![doc = "Main entry point for the bodhi-chat command-line client."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bodhi_chat::cli::{Cli, Commands};
use bodhi_chat::commands;
use bodhi_chat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Ask {
            prompt,
            model,
            no_stream,
        } => {
            tracing::debug!("Sending one-shot message");
            commands::ask::run_ask(config, prompt, model, no_stream).await
        }
        Commands::Chat { model } => {
            if let Some(m) = &model {
                tracing::debug!("Using model override: {}", m);
            }
            commands::chat::run_chat(config, model).await
        }
        Commands::Chats { command } => commands::chats::handle_chats(&config, command).await,
        Commands::Settings { command } => {
            commands::settings::handle_settings(&config, command).await
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so streamed answers on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "bodhi_chat=debug"
    } else {
        "bodhi_chat=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
