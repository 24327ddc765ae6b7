use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use pal_gateway::bootstrap;
use pal_gateway::cli::{Cli, Command, ConfigCommand};
use pal_gateway::runtime::notify::LogSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to chat when no subcommand is given.
        None => {
            init_cli_tracing("warn");
            let (config, _) = pal_gateway::cli::load_config()?;
            pal_gateway::cli::chat::chat(config, None, None).await
        }
        Some(Command::Chat { conversation, friend }) => {
            init_cli_tracing("warn");
            let (config, _) = pal_gateway::cli::load_config()?;
            pal_gateway::cli::chat::chat(config, conversation, friend).await
        }
        Some(Command::Friend(cmd)) => {
            init_cli_tracing("warn");
            let (config, _) = pal_gateway::cli::load_config()?;
            let state = bootstrap::build_app_state(config, Arc::new(LogSink)).await?;
            pal_gateway::cli::friends::run_friend(&state, cmd).await
        }
        Some(Command::Group(cmd)) => {
            init_cli_tracing("warn");
            let (config, _) = pal_gateway::cli::load_config()?;
            let state = bootstrap::build_app_state(config, Arc::new(LogSink)).await?;
            pal_gateway::cli::friends::run_group(&state, cmd).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = pal_gateway::cli::load_config()?;
            let valid = pal_gateway::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = pal_gateway::cli::load_config()?;
            pal_gateway::cli::config::show(&config)
        }
        Some(Command::Config(ConfigCommand::Models)) => {
            let (config, _config_path) = pal_gateway::cli::load_config()?;
            pal_gateway::cli::config::models(&config);
            Ok(())
        }
        Some(Command::Daemon) => {
            init_tracing();
            let (config, _) = pal_gateway::cli::load_config()?;
            pal_gateway::cli::daemon::run(config).await
        }
        Some(Command::Version) => {
            println!("palchat {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Structured JSON tracing for the long-running `daemon` command.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pal_gateway=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer().json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Compact stderr tracing for interactive commands. `RUST_LOG` overrides
/// the default filter.
fn init_cli_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
