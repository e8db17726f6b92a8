//! Node-held accounts
//!
//! Keys live in the node wallet. The client only asks the node to create,
//! unlock and list accounts, and never sees key material.

use std::time::{Duration, SystemTime};

use conduit_primitives::{Address, U256};
use serde_json::Value;

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::types::{BlockId, PendingTransaction, TransactionRequest};

/// JSON-RPC code for an unsupported method
const METHOD_NOT_FOUND: i64 = -32601;

/// Lock state as last observed by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Transactions from this account will be refused
    Locked,
    /// Unlocked until the given time
    UnlockedUntil(SystemTime),
}

/// An account held by the node wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account address
    pub address: Address,
    /// Lock state
    pub lock: LockState,
    /// Balance in wei at the last refresh
    pub balance: U256,
}

impl Account {
    /// A locked account with unknown (zero) balance
    pub fn new(address: Address) -> Self {
        Self {
            address,
            lock: LockState::Locked,
            balance: U256::zero(),
        }
    }

    /// Whether the unlock window is still open
    pub fn is_unlocked(&self) -> bool {
        match self.lock {
            LockState::Locked => false,
            LockState::UnlockedUntil(until) => SystemTime::now() < until,
        }
    }
}

/// Creates, unlocks and lists accounts through the node
#[derive(Debug, Clone)]
pub struct AccountManager {
    client: Client,
}

impl AccountManager {
    /// Manager sharing `client`'s transport
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create an account protected by `passphrase`
    pub async fn create_account(&self, passphrase: &str) -> Result<Account> {
        let result: Result<Address> = self
            .client
            .request("personal_newAccount", vec![Value::String(passphrase.to_string())])
            .await;
        match result {
            Ok(address) => {
                tracing::info!(address = %address, "account created");
                Ok(Account::new(address))
            }
            Err(ClientError::Rpc { message, .. }) => Err(ClientError::AccountCreation(message)),
            Err(ClientError::Serialization(message)) => Err(ClientError::AccountCreation(
                format!("node returned no address: {}", message),
            )),
            Err(e) => Err(e),
        }
    }

    /// Unlock `account` for `duration`
    ///
    /// Returns `false` when the node refuses, typically a wrong passphrase.
    /// Transport failures are still errors.
    pub async fn unlock(
        &self,
        account: &mut Account,
        passphrase: &str,
        duration: Duration,
    ) -> Result<bool> {
        let result: Result<bool> = self
            .client
            .request(
                "personal_unlockAccount",
                vec![
                    Value::String(account.address.to_hex()),
                    Value::String(passphrase.to_string()),
                    Value::from(duration.as_secs()),
                ],
            )
            .await;

        match result {
            Ok(true) => {
                account.lock = LockState::UnlockedUntil(SystemTime::now() + duration);
                Ok(true)
            }
            Ok(false) => {
                tracing::warn!(address = %account.address, "unlock refused");
                account.lock = LockState::Locked;
                Ok(false)
            }
            Err(ClientError::Rpc { message, .. }) => {
                tracing::warn!(address = %account.address, reason = %message, "unlock failed");
                account.lock = LockState::Locked;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Accounts in node order, with current balances
    ///
    /// Falls back to `eth_accounts` on nodes without the `personal` API.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let listed: Result<Vec<Address>> = self
            .client
            .request_idempotent("personal_listAccounts", vec![])
            .await;
        let addresses = match listed {
            Ok(addresses) => addresses,
            Err(ClientError::Rpc {
                code: METHOD_NOT_FOUND,
                ..
            }) => self.client.accounts().await?,
            Err(e) => return Err(e),
        };

        let mut accounts = Vec::with_capacity(addresses.len());
        for address in addresses {
            let mut account = Account::new(address);
            account.balance = self.balance(&address).await?;
            accounts.push(account);
        }
        Ok(accounts)
    }

    /// Latest balance of `address`
    pub async fn balance(&self, address: &Address) -> Result<U256> {
        self.client.get_balance(address, BlockId::Latest).await
    }

    /// Re-read the balance of `account`
    pub async fn refresh(&self, account: &mut Account) -> Result<()> {
        account.balance = self.balance(&account.address).await?;
        Ok(())
    }

    /// The node's coinbase account
    pub async fn coinbase(&self) -> Result<Account> {
        let address = self.client.coinbase().await?;
        let mut account = Account::new(address);
        self.refresh(&mut account).await?;
        Ok(account)
    }

    /// Send `value` wei from `from` to `to`; `from` must be unlocked on the node
    pub async fn transfer(
        &self,
        from: &Account,
        to: &Address,
        value: U256,
    ) -> Result<PendingTransaction> {
        self.client
            .send_transaction(TransactionRequest::transfer(from.address, *to, value))
            .await
    }
}
