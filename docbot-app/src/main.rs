use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use docbot_app::command::Command;
use docbot_app::config::{self, AppConfig};
use docbot_app::{init_logging, App};
use docbot_services::Services;

/// Terminal document assistant with shared annotations and chat.
#[derive(Parser, Debug)]
#[command(name = "docbot", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = config::ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Display name for annotations and chat
    #[arg(long)]
    user: Option<String>,

    /// Relay base URL, e.g. ws://127.0.0.1:6789
    #[arg(long)]
    relay_url: Option<String>,

    /// Disable ANSI colours
    #[arg(long)]
    no_color: bool,

    /// PDF to open at startup
    document: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Interactive output shares the terminal with logs
    init_logging("warn");
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(user) = cli.user {
        config.username = Some(user);
    }
    if let Some(url) = cli.relay_url {
        config.collab.relay_url = url;
    }
    if cli.no_color {
        config.color = false;
    }
    log::info!("Relay at {}", config.collab.relay_url);

    let services = Services::from_config(&config.services).context("failed to set up services")?;
    let mut app = App::new(&config, services);

    if let Some(path) = cli.document {
        let (_, output) = app.handle(Command::Open(path)).await;
        println!("{output}");
    }

    app.run().await
}
