//! Roomcast CLI - serve a broker or listen for notices from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use roomcast_broker::{Broker, BrokerConfig};
use roomcast_client::Roomcast;
use roomcast_core::{Identity, DEFAULT_WS_PORT};

/// Roomcast - room-based realtime notification broker
#[derive(Parser)]
#[command(name = "roomcast")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a Roomcast broker
    Serve {
        /// Listen address
        #[arg(short, long, default_value_t = format!("0.0.0.0:{}", DEFAULT_WS_PORT))]
        listen: String,

        /// Broker name, echoed in WELCOME replies
        #[arg(short, long, default_value = "Roomcast Broker")]
        name: String,

        /// Maximum simultaneous connections
        #[arg(short, long, default_value_t = 1024)]
        max_connections: usize,

        /// Config file path (TOML; flags win over file values)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Connect as a client and print every received notice
    Listen {
        /// Broker URL
        #[arg(short, long, default_value_t = format!("ws://127.0.0.1:{}", DEFAULT_WS_PORT))]
        url: String,

        /// Identity id to register
        #[arg(short, long)]
        id: String,

        /// Identity role (user, creator, admin)
        #[arg(short, long, default_value = "user")]
        role: String,

        /// Event names to subscribe to
        #[arg(short, long, default_values_t = vec!["announcement".to_string(), "notification".to_string()])]
        event: Vec<String>,
    },
}

/// Serve options readable from a TOML file
#[derive(Debug, Default, Deserialize)]
struct ServeFileConfig {
    name: Option<String>,
    max_connections: Option<usize>,
    listen: Option<String>,
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
        Commands::Serve {
            listen,
            name,
            max_connections,
            config,
        } => serve(listen, name, max_connections, config).await,
        Commands::Listen {
            url,
            id,
            role,
            event,
        } => listen(url, id, role, event).await,
    }
}

async fn serve(
    listen: String,
    name: String,
    max_connections: usize,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let file = match config_path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<ServeFileConfig>(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => ServeFileConfig::default(),
    };

    let addr = file.listen.unwrap_or(listen);
    let config = BrokerConfig {
        name: file.name.unwrap_or(name),
        max_connections: file.max_connections.unwrap_or(max_connections),
    };

    println!("{}", "Roomcast Broker".bold());
    println!("  name:    {}", config.name.cyan());
    println!("  listen:  {}", addr.cyan());
    println!("  clients: up to {}", config.max_connections);

    let broker = Broker::new(config);
    tracing::info!("Starting Roomcast broker on {}", addr);

    tokio::select! {
        result = broker.serve_websocket(&addr) => {
            result.context("broker serve loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", "Shutting down".yellow());
            broker.stop();
        }
    }

    Ok(())
}

async fn listen(url: String, id: String, role: String, events: Vec<String>) -> Result<()> {
    let client = Roomcast::builder(&url)
        .keepalive_interval(Duration::from_secs(30))
        .build();

    for event in &events {
        let label = event.clone();
        client.on(event, move |notice| {
            let header = format!("[{}] {}", label, notice.title).green().bold();
            match serde_json::to_string(&notice) {
                Ok(json) => println!("{} {}", header, json),
                Err(_) => println!("{} {}", header, notice.message),
            }
        });
    }

    client
        .connect(Identity::new(id.clone(), role.clone()))
        .await
        .with_context(|| format!("connecting to {}", url))?;

    println!(
        "{} {} as {} ({}), waiting for notices...",
        "Connected to".bold(),
        url.cyan(),
        id.cyan(),
        role
    );

    tokio::signal::ctrl_c().await?;
    println!("\n{}", "Disconnecting".yellow());
    client.disconnect().await;

    Ok(())
}
