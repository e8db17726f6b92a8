//! Contract commands: deploy, call, send and offline linking

use std::path::{Path, PathBuf};

use clap::Args;
use conduit_client::{CallOptions, ContractBinder, LinkTable};

use super::{
    client, load_artifact, parse_address, parse_tokens, parse_wei, print_receipt, resolve_call,
    sender, tokens_json,
};
use crate::{config::Config, output::Output, CliError};

/// Where a contract comes from
#[derive(Debug, Args)]
pub struct ArtifactArgs {
    /// Artifact JSON or compiler output file
    #[arg(short, long)]
    pub artifact: PathBuf,
    /// Contract to select from compiler output, as `File.sol:Name`
    #[arg(short, long)]
    pub contract: Option<String>,
}

/// Library addresses given as `File.sol:Name=0x…`
fn link_table(links: &[String]) -> Result<LinkTable, CliError> {
    let table = LinkTable::new();
    for link in links {
        let (name, address) = link.split_once('=').ok_or_else(|| {
            CliError::InvalidInput(format!("expected NAME=ADDRESS, got {}", link))
        })?;
        table.insert(name.trim(), parse_address(address.trim())?)?;
    }
    Ok(table)
}

/// `deploy`
#[derive(Debug, Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub source: ArtifactArgs,
    /// Sending account; must be unlocked
    #[arg(long)]
    pub from: Option<String>,
    /// Gas limit
    #[arg(long)]
    pub gas: Option<u64>,
    /// Known library address, `File.sol:Name=0x…`
    #[arg(long = "link")]
    pub links: Vec<String>,
    /// Library artifact to deploy first, `path` or `path:File.sol:Name`
    #[arg(long = "library")]
    pub libraries: Vec<String>,
    /// Constructor arguments
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl DeployArgs {
    pub async fn execute(self, config: &Config, json: bool) -> Result<(), CliError> {
        let from = sender(self.from.as_deref(), config)?;
        let binder = ContractBinder::new(client(config)?);
        let table = link_table(&self.links)?;

        for library in &self.libraries {
            let (path, name) = match library.split_once(':') {
                Some((path, name)) => (path, Some(name)),
                None => (library.as_str(), None),
            };
            let artifact = load_artifact(Path::new(path), name)?;
            table.deploy_library(&binder, &artifact, &from).await?;
        }

        let artifact = load_artifact(&self.source.artifact, self.source.contract.as_deref())?
            .linked(&table)?;
        let types = artifact
            .abi
            .constructor
            .as_ref()
            .map(|c| c.input_types())
            .unwrap_or_default();
        let args = parse_tokens(&types, &self.args)?;

        let handle = binder.deploy(&artifact, &args, &from, self.gas).await?;
        let libraries: serde_json::Map<String, serde_json::Value> = table
            .entries()
            .into_iter()
            .map(|(name, address)| (name, address.to_hex().into()))
            .collect();

        Output::new(json)
            .field("contract", &artifact.name)
            .field("address", handle.address())
            .field_value("libraries", libraries.into())
            .message(format!("Deployed {} at {}", artifact.name, handle.address()))
            .print();
        Ok(())
    }
}

/// `call` and `send`
#[derive(Debug, Args)]
pub struct InvokeArgs {
    /// Contract address
    pub address: String,
    #[command(flatten)]
    pub source: ArtifactArgs,
    /// Function name or full signature
    pub function: String,
    /// Function arguments
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// Sending account
    #[arg(long)]
    pub from: Option<String>,
    /// Gas limit
    #[arg(long)]
    pub gas: Option<u64>,
    /// Wei to attach; payable functions only
    #[arg(long)]
    pub value: Option<String>,
}

impl InvokeArgs {
    fn options(&self, config: &Config, require_sender: bool) -> Result<CallOptions, CliError> {
        let from = match (&self.from, require_sender) {
            (Some(from), _) => Some(parse_address(from)?),
            (None, true) => Some(sender(None, config)?),
            (None, false) => config
                .default_from
                .as_deref()
                .map(parse_address)
                .transpose()?,
        };
        Ok(CallOptions {
            from,
            gas: self.gas,
            value: self.value.as_deref().map(parse_wei).transpose()?,
        })
    }

    /// Read through `eth_call`
    pub async fn call(self, config: &Config, json: bool) -> Result<(), CliError> {
        let options = self.options(config, false)?;
        let artifact = load_artifact(&self.source.artifact, self.source.contract.as_deref())?;
        let handle = ContractBinder::new(client(config)?)
            .attach_artifact(parse_address(&self.address)?, &artifact)?;

        let (signature, args) = resolve_call(handle.abi(), &self.function, &self.args)?;
        let values = handle.call_with(&signature, &args, &options).await?;
        let rendered = tokens_json(&values);

        Output::new(json)
            .field("function", &signature)
            .field_value("result", rendered.clone())
            .message(format!("{} => {}", signature, rendered))
            .print();
        Ok(())
    }

    /// Submit a transaction, optionally waiting for its receipt
    pub async fn send(self, config: &Config, json: bool, wait: bool) -> Result<(), CliError> {
        let options = self.options(config, true)?;
        let artifact = load_artifact(&self.source.artifact, self.source.contract.as_deref())?;
        let client = client(config)?;
        let handle = ContractBinder::new(client.clone())
            .attach_artifact(parse_address(&self.address)?, &artifact)?;

        let (signature, args) = resolve_call(handle.abi(), &self.function, &self.args)?;
        let mut pending = handle.send_with(&signature, &args, &options).await?;
        if wait {
            let receipt = client.wait(&mut pending).await?;
            print_receipt(&receipt, json);
        } else {
            Output::new(json)
                .field("hash", pending.hash)
                .field_u64("nonce", pending.nonce)
                .message(format!("Submitted {}\nHash: {}", signature, pending.hash))
                .print();
        }
        Ok(())
    }
}

/// `link`: resolve placeholders offline and print the bytecode
#[derive(Debug, Args)]
pub struct LinkArgs {
    #[command(flatten)]
    pub source: ArtifactArgs,
    /// Library address, `File.sol:Name=0x…`
    #[arg(long = "link")]
    pub links: Vec<String>,
}

impl LinkArgs {
    pub fn execute(self, json: bool) -> Result<(), CliError> {
        let artifact = load_artifact(&self.source.artifact, self.source.contract.as_deref())?;
        let table = link_table(&self.links)?;
        let linked = artifact.linked(&table)?;

        Output::new(json)
            .field("contract", &linked.name)
            .field("bytecode", &linked.bytecode)
            .message(linked.bytecode.clone())
            .print();
        Ok(())
    }
}
