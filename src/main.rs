//! BattleZips client - wallet session and proof asset tooling

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

// Use the library crate
use battlezips_client::cli::commands;
use battlezips_client::config::Config;

/// BattleZips client
#[derive(Parser)]
#[command(name = "battlezips")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "battlezips.toml", env = "BATTLEZIPS_CONFIG")]
    config: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known networks and which are supported
    Networks,

    /// Show current configuration (secrets masked)
    Config,

    /// Connect a wallet session through the configured providers
    Connect {
        /// Stay attached and report account/network changes
        #[arg(long)]
        watch: bool,
    },

    /// Forget the cached provider selection
    Disconnect,

    /// Fetch the circuit assets for a proof kind (board, shot)
    Assets {
        /// Proof kind
        kind: String,
    },
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("battlezips_client=info".parse()?);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json)?;

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Networks => commands::networks(&config),
        Commands::Config => commands::show_config(&config),
        Commands::Connect { watch } => commands::connect(&config, watch).await,
        Commands::Disconnect => commands::disconnect(&config),
        Commands::Assets { kind } => commands::assets(&config, &kind).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
