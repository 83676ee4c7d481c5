//! A3S Gateway CLI - static pages, search proxy and tunnel in one server.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use a3s_gateway::{config::GatewayConfig, engines, Gateway};

/// A3S Gateway - HTTP gateway with a cached search proxy
#[derive(Parser)]
#[command(name = "a3s-gateway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML config file (overrides A3S_GATEWAY_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available search engines
    Engines,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Commands::Engines) => {
            list_engines();
            Ok(())
        }
        None => serve(cli.config, cli.port).await,
    }
}

fn list_engines() {
    println!("Available search engines:\n");
    for (shortcut, description) in engines::AVAILABLE {
        println!("  {:<12} - {}", shortcut, description);
    }
    println!();
    println!("Select one with `engine = \"...\"` or A3S_GATEWAY_ENGINE.");
}

async fn serve(config_file: Option<PathBuf>, port: Option<u16>) -> Result<()> {
    let mut config = GatewayConfig::load(config_file.as_deref())?;
    if let Some(port) = port {
        config.port = port;
        config.validate()?;
    }

    Gateway::from_config(config)?.serve().await?;
    Ok(())
}
