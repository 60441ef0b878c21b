use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use docbot_app::config::{self, AppConfig};
use docbot_app::init_logging;
use docbot_collab::RelayServer;

/// Broadcast relay for docbot sessions. Each request path is a room.
#[derive(Parser, Debug)]
#[command(name = "docbot-relay", version, about)]
struct Cli {
    /// TOML configuration file ([relay] section)
    #[arg(long, env = config::ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Address to bind, e.g. 0.0.0.0:6789
    #[arg(long)]
    bind: Option<String>,

    /// Drop frames larger than this many bytes
    #[arg(long)]
    max_frame_bytes: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("info");
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?.relay;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if cli.max_frame_bytes.is_some() {
        config.max_frame_bytes = cli.max_frame_bytes;
    }

    let relay = RelayServer::new(config);
    log::info!("Starting relay on {}", relay.bind_addr());
    relay
        .run()
        .await
        .with_context(|| format!("relay on {} stopped", relay.bind_addr()))
}
