//! askgenie - Web and video answers in your terminal
//!
#![doc = "askgenie - Web and video answers in your terminal"]
#![doc = "Main entry point for the askgenie application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use askgenie::cli::{Cli, Commands};
use askgenie::commands;
use askgenie::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { new, session } => {
            tracing::info!("Starting interactive chat mode");
            if let Some(s) = &session {
                tracing::debug!("Opening session: {}", s);
            }
            commands::chat::run_chat(config, new, session).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            commands::history::handle_history(&config, command).await?;
            Ok(())
        }
        Commands::Usage { grant_premium } => {
            if grant_premium {
                commands::usage::grant_premium(&config)?;
            }
            commands::usage::show_usage(&config).await?;
            Ok(())
        }
        Commands::Health => {
            commands::health::check_health(&config).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins; otherwise `askgenie=info`, or `askgenie=debug` with
/// `--verbose`.
fn init_tracing(verbose: bool, json_logs: bool) {
    let default_level = if verbose {
        "askgenie=debug"
    } else {
        "askgenie=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
