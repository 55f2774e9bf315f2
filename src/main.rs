//! chain-session - drive the wallet session core from a terminal
//!
//! Runs against an in-process simulated wallet. Prompts that a real wallet
//! would show (connect, switch network, sign) are asked on the terminal.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use chain_session::cli::commands;
use chain_session::config::Config;

/// Wallet session manager for token-drop claims and marketplace purchases
#[derive(Parser)]
#[command(name = "chain-session")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "chain-session.toml")]
    config: String,

    /// Approve every wallet prompt without asking
    #[arg(short, long, global = true)]
    yes: bool,

    /// Sandbox execution: addresses resolve to the zero sentinel
    #[arg(long, global = true, env = "CHAIN_SESSION_SANDBOX")]
    sandbox: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Claim the token-drop allocation
    Claim,

    /// Buy one unit of a marketplace listing
    Buy {
        /// Listing id
        item_id: String,
    },

    /// Print the wallet address
    Address,

    /// Connect, check the network and show the session
    Status,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chain_session=info".parse()?),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    if cli.sandbox {
        config.session.sandbox_execution = true;
    }

    // Execute command
    let result = match cli.command {
        Commands::Claim => commands::claim(&config, cli.yes).await,
        Commands::Buy { item_id } => commands::buy(&config, &item_id, cli.yes).await,
        Commands::Address => commands::address(&config, cli.yes).await,
        Commands::Status => commands::status(&config, cli.yes).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
