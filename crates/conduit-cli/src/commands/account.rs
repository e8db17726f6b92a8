//! Account commands

use std::time::Duration;

use clap::Subcommand;
use conduit_client::{Account, AccountManager};
use serde_json::json;

use super::{client, parse_address};
use crate::{config::Config, output::Output, CliError};

/// Account subcommands
#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    /// Create a new account in the node wallet
    New {
        /// Passphrase protecting the key
        #[arg(short, long)]
        passphrase: String,
    },
    /// List wallet accounts with balances
    List,
    /// Unlock an account for signing
    Unlock {
        /// Account address
        address: String,
        /// Account passphrase
        #[arg(short, long)]
        passphrase: String,
        /// Seconds to stay unlocked
        #[arg(short, long, default_value = "300")]
        duration: u64,
    },
    /// Show an account balance in wei
    Balance {
        /// Account address
        address: String,
    },
}

impl AccountCommand {
    pub async fn execute(self, config: &Config, json: bool) -> Result<(), CliError> {
        let accounts = AccountManager::new(client(config)?);
        match self {
            AccountCommand::New { passphrase } => {
                let account = accounts.create_account(&passphrase).await?;
                Output::new(json)
                    .field("address", account.address)
                    .message(format!("Created new account\nAddress: {}", account.address))
                    .print();
            }
            AccountCommand::List => {
                let listed = accounts.list_accounts().await?;
                let rows: Vec<_> = listed
                    .iter()
                    .map(|a| json!({"address": a.address.to_hex(), "balance": a.balance.to_string()}))
                    .collect();
                let text = if listed.is_empty() {
                    "No accounts".to_string()
                } else {
                    listed
                        .iter()
                        .enumerate()
                        .map(|(i, a)| format!("[{}] {} {} wei", i, a.address, a.balance))
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                Output::new(json)
                    .field_value("accounts", json!(rows))
                    .message(text)
                    .print();
            }
            AccountCommand::Unlock {
                address,
                passphrase,
                duration,
            } => {
                let mut account = Account::new(parse_address(&address)?);
                let unlocked = accounts
                    .unlock(&mut account, &passphrase, Duration::from_secs(duration))
                    .await?;
                if !unlocked {
                    return Err(CliError::InvalidInput(format!(
                        "node refused to unlock {}",
                        account.address
                    )));
                }
                Output::new(json)
                    .field("address", account.address)
                    .field_u64("duration_secs", duration)
                    .message(format!("Unlocked {} for {}s", account.address, duration))
                    .print();
            }
            AccountCommand::Balance { address } => {
                let address = parse_address(&address)?;
                let balance = accounts.balance(&address).await?;
                Output::new(json)
                    .field("address", address)
                    .field("balance_wei", balance)
                    .message(format!("Balance: {} wei", balance))
                    .print();
            }
        }
        Ok(())
    }
}
