//! Node queries, value transfers and receipts

use clap::Args;
use conduit_client::{Account, AccountManager};

use super::{client, parse_address, parse_hash, parse_wei, print_receipt, sender};
use crate::{config::Config, output::Output, CliError};

/// Show what the node reports about itself
pub async fn info(config: &Config, json: bool) -> Result<(), CliError> {
    let client = client(config)?;
    let version = client.client_version().await?;
    let chain_id = client.chain_id().await?;
    let block = client.block_number().await?;
    let gas_price = client.gas_price().await?;

    Output::new(json)
        .field("rpc_url", &config.client.rpc_url)
        .field("client_version", &version)
        .field_u64("chain_id", chain_id)
        .field_u64("block_number", block)
        .field("gas_price_wei", gas_price)
        .message(format!(
            "Node: {}\nChain ID: {}\nBlock: {}\nGas price: {} wei",
            version, chain_id, block, gas_price
        ))
        .print();
    Ok(())
}

/// `transfer`
#[derive(Debug, Args)]
pub struct TransferArgs {
    /// Recipient address
    #[arg(long)]
    pub to: String,
    /// Amount in wei, decimal or 0x hex
    #[arg(long)]
    pub value: String,
    /// Sending account; must be unlocked
    #[arg(long)]
    pub from: Option<String>,
    /// Wait for the receipt
    #[arg(long)]
    pub wait: bool,
}

impl TransferArgs {
    pub async fn execute(self, config: &Config, json: bool) -> Result<(), CliError> {
        let from = Account::new(sender(self.from.as_deref(), config)?);
        let to = parse_address(&self.to)?;
        let value = parse_wei(&self.value)?;

        let client = client(config)?;
        let mut pending = AccountManager::new(client.clone())
            .transfer(&from, &to, value)
            .await?;

        if self.wait {
            let receipt = client.wait(&mut pending).await?;
            print_receipt(&receipt, json);
        } else {
            Output::new(json)
                .field("hash", pending.hash)
                .field_u64("nonce", pending.nonce)
                .message(format!(
                    "Sent {} wei from {} to {}\nHash: {}",
                    value, from.address, to, pending.hash
                ))
                .print();
        }
        Ok(())
    }
}

/// `receipt`
#[derive(Debug, Args)]
pub struct ReceiptArgs {
    /// Transaction hash
    pub hash: String,
    /// Poll until the receipt appears or the configured timeout passes
    #[arg(long)]
    pub wait: bool,
}

impl ReceiptArgs {
    pub async fn execute(self, config: &Config, json: bool) -> Result<(), CliError> {
        let hash = parse_hash(&self.hash)?;
        let client = client(config)?;

        let receipt = if self.wait {
            Some(
                client
                    .wait_for_receipt(
                        &hash,
                        config.client.poll_interval(),
                        config.client.receipt_timeout(),
                    )
                    .await?,
            )
        } else {
            client.get_receipt(&hash).await?
        };

        match receipt {
            Some(receipt) => print_receipt(&receipt, json),
            None => Output::new(json)
                .field("hash", hash)
                .field("status", "pending")
                .message(format!("Transaction {} is pending", hash))
                .print(),
        }
        Ok(())
    }
}
