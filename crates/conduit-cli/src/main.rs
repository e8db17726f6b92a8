//! # conduit-cli
//!
//! Command-line caller for a node's JSON-RPC surface.
//!
//! ## Usage
//!
//! ```bash
//! # Accounts held by the node wallet
//! conduit account new --passphrase mypasswd
//! conduit account unlock 0x... --passphrase mypasswd --duration 1000
//! conduit account list
//!
//! # Fund, deploy and use a contract
//! conduit transfer --from 0x... --to 0x... --value 1000000000000000000 --wait
//! conduit deploy --artifact Debit.json --from 0x...
//! conduit send 0x... --artifact Debit.json setBuffer 69 --from 0x... --wait
//! conduit call 0x... --artifact Debit.json getBuffer
//!
//! # Libraries, receipts and events
//! conduit link --artifact out.json --contract User.sol:User --link Lib.sol:Lib=0x...
//! conduit receipt 0x... --wait
//! conduit watch 0x... --artifact Debit.json --event BufferSet
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod error;
mod output;

pub use config::Config;
pub use error::CliError;
pub use output::Output;

/// Conduit CLI
#[derive(Parser, Debug)]
#[command(name = "conduit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// RPC endpoint URL
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Config file instead of ~/.conduit/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Account management
    #[command(subcommand)]
    Account(commands::account::AccountCommand),
    /// Send wei between accounts
    Transfer(commands::node::TransferArgs),
    /// Deploy a compiled contract
    Deploy(commands::contract::DeployArgs),
    /// Call a contract function without a transaction
    Call(commands::contract::InvokeArgs),
    /// Send a transaction to a contract function
    Send {
        #[command(flatten)]
        invoke: commands::contract::InvokeArgs,
        /// Wait for the receipt
        #[arg(long)]
        wait: bool,
    },
    /// Show a transaction receipt
    Receipt(commands::node::ReceiptArgs),
    /// Link library addresses into bytecode
    Link(commands::contract::LinkArgs),
    /// Print contract events as they are mined
    Watch(commands::watch::WatchArgs),
    /// Show node information
    Info,
    /// Show or edit configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Set RPC URL
        #[arg(long)]
        set_rpc: Option<String>,
        /// Set the default sending account
        #[arg(long)]
        set_from: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let json = cli.json;
    if let Err(e) = run(cli).await {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "error": e.to_string(),
                    "success": false
                })
            );
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(rpc_url) = cli.rpc_url {
        config.client.rpc_url = rpc_url;
    }
    tracing::debug!(rpc_url = %config.client.rpc_url, "configuration loaded");

    let json = cli.json;
    match cli.command {
        Commands::Account(cmd) => cmd.execute(&config, json).await,
        Commands::Transfer(args) => args.execute(&config, json).await,
        Commands::Deploy(args) => args.execute(&config, json).await,
        Commands::Call(args) => args.call(&config, json).await,
        Commands::Send { invoke, wait } => invoke.send(&config, json, wait).await,
        Commands::Receipt(args) => args.execute(&config, json).await,
        Commands::Link(args) => args.execute(json),
        Commands::Watch(args) => args.execute(&config, json).await,
        Commands::Info => commands::node::info(&config, json).await,
        Commands::Config {
            show,
            set_rpc,
            set_from,
        } => handle_config(&mut config, cli.config, show, set_rpc, set_from, json),
    }
}

fn handle_config(
    config: &mut Config,
    path: Option<PathBuf>,
    show: bool,
    set_rpc: Option<String>,
    set_from: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let mut modified = false;

    if let Some(rpc) = set_rpc {
        config.client.rpc_url = rpc;
        modified = true;
    }

    if let Some(from) = set_from {
        commands::parse_address(&from)?;
        config.default_from = Some(from);
        modified = true;
    }

    if modified {
        config.client.validate()?;
        let saved = config.save(path.as_deref())?;
        Output::new(json)
            .field("status", "saved")
            .field("path", saved.display())
            .message(format!("Configuration saved to {}", saved.display()))
            .print();
    } else if show {
        Output::new(json)
            .field("rpc_url", &config.client.rpc_url)
            .field_u64("gas_limit", config.client.gas_limit)
            .field_u64("poll_interval_ms", config.client.poll_interval_ms)
            .field_u64("receipt_timeout_ms", config.client.receipt_timeout_ms)
            .field_value("default_from", serde_json::json!(config.default_from))
            .message(format!(
                "RPC URL: {}\nGas Limit: {}\nPoll interval: {}ms\nReceipt timeout: {}ms\nDefault from: {}",
                config.client.rpc_url,
                config.client.gas_limit,
                config.client.poll_interval_ms,
                config.client.receipt_timeout_ms,
                config.default_from.as_deref().unwrap_or("-")
            ))
            .print();
    } else {
        Output::new(json)
            .message("Use --show to display config, or --set-rpc/--set-from to modify")
            .print();
    }

    Ok(())
}
