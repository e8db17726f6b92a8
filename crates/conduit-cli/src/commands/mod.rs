//! Subcommands and the argument parsing they share

pub mod account;
pub mod contract;
pub mod node;
pub mod watch;

use std::path::Path;

use conduit_client::abi::{Abi, ParamType, Token};
use conduit_client::types::Receipt;
use conduit_client::{Client, CompiledArtifact, H256, U256};
use conduit_primitives::{quantity, Address};
use serde_json::{json, Value};

use crate::{config::Config, output::Output, CliError};

/// Build a client from the loaded configuration
pub fn client(config: &Config) -> Result<Client, CliError> {
    Ok(Client::from_config(config.client.clone())?)
}

pub fn parse_address(s: &str) -> Result<Address, CliError> {
    s.parse()
        .map_err(|e| CliError::InvalidAddress(format!("{}: {}", s, e)))
}

pub fn parse_hash(s: &str) -> Result<H256, CliError> {
    s.parse()
        .map_err(|e| CliError::InvalidInput(format!("transaction hash {}: {}", s, e)))
}

/// Wei amount, decimal or `0x` hex
pub fn parse_wei(s: &str) -> Result<U256, CliError> {
    let parsed = if s.starts_with("0x") {
        quantity::parse_u256(s).map_err(|e| e.to_string())
    } else {
        U256::from_dec_str(s).map_err(|e| format!("{:?}", e))
    };
    parsed.map_err(|e| CliError::InvalidAmount(format!("{}: {}", s, e)))
}

/// `--from`, falling back to the configured default account
pub fn sender(from: Option<&str>, config: &Config) -> Result<Address, CliError> {
    match from.or(config.default_from.as_deref()) {
        Some(from) => parse_address(from),
        None => Err(CliError::InvalidInput(
            "no sending account; pass --from or set default_from in the config".into(),
        )),
    }
}

pub fn load_artifact(path: &Path, contract: Option<&str>) -> Result<CompiledArtifact, CliError> {
    Ok(CompiledArtifact::load(path, contract)?)
}

/// Parse textual arguments against `types`
pub fn parse_tokens(types: &[ParamType], args: &[String]) -> Result<Vec<Token>, CliError> {
    if types.len() != args.len() {
        return Err(CliError::InvalidInput(format!(
            "expected {} arguments, got {}",
            types.len(),
            args.len()
        )));
    }
    types
        .iter()
        .zip(args)
        .map(|(kind, arg)| Token::parse(kind, arg).map_err(CliError::from))
        .collect()
}

/// Pick the overload of `function` whose inputs accept `args`
///
/// Returns its canonical signature with the parsed arguments.
pub fn resolve_call(
    abi: &Abi,
    function: &str,
    args: &[String],
) -> Result<(String, Vec<Token>), CliError> {
    let candidates: Vec<_> = if function.contains('(') {
        abi.functions
            .iter()
            .filter(|f| f.signature() == function)
            .collect()
    } else {
        abi.functions_named(function).collect()
    };
    if candidates.is_empty() {
        return Err(CliError::InvalidInput(format!("no function {} in the ABI", function)));
    }

    let mut last_error = None;
    for candidate in candidates {
        match parse_tokens(&candidate.input_types(), args) {
            Ok(tokens) => return Ok((candidate.signature(), tokens)),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        CliError::InvalidInput(format!("no overload of {} accepts these arguments", function))
    }))
}

pub fn tokens_json(tokens: &[Token]) -> Value {
    Value::Array(tokens.iter().map(Token::to_json).collect())
}

pub fn print_receipt(receipt: &Receipt, json_mode: bool) {
    let status = format!("{:?}", receipt.tx_status()).to_lowercase();
    let mut message = format!(
        "Transaction: {}\nStatus: {}\nBlock: {}",
        receipt.transaction_hash,
        status,
        receipt
            .block_number
            .map_or_else(|| "-".to_string(), |b| b.to_string())
    );
    if let Some(address) = receipt.contract_address {
        message.push_str(&format!("\nContract: {}", address));
    }
    if let Some(gas) = receipt.gas_used {
        message.push_str(&format!("\nGas used: {}", gas));
    }

    Output::new(json_mode)
        .field("hash", receipt.transaction_hash)
        .field("status", &status)
        .field_value("block_number", json!(receipt.block_number))
        .field_value(
            "contract_address",
            json!(receipt.contract_address.map(|a| a.to_hex())),
        )
        .field_value("gas_used", json!(receipt.gas_used))
        .field_u64("logs", receipt.logs.len() as u64)
        .message(message)
        .print();
}

#[cfg(test)]
mod tests {
    use super::*;

    const OVERLOADED: &str = r#"[
        {"type":"function","name":"put","inputs":[{"name":"x","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"},
        {"type":"function","name":"put","inputs":[{"name":"who","type":"address"},{"name":"x","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"},
        {"type":"function","name":"tag","inputs":[{"name":"s","type":"string"}],"outputs":[],"stateMutability":"nonpayable"}
    ]"#;

    #[test]
    fn test_parse_wei() {
        assert_eq!(parse_wei("1000").unwrap(), U256::from(1000));
        assert_eq!(parse_wei("0x3e8").unwrap(), U256::from(1000));
        assert!(matches!(parse_wei("1.5"), Err(CliError::InvalidAmount(_))));
    }

    #[test]
    fn test_sender_falls_back_to_config() {
        let mut config = Config::default();
        assert!(sender(None, &config).is_err());

        config.default_from = Some(format!("0x{}", "11".repeat(20)));
        assert_eq!(sender(None, &config).unwrap(), Address::from_bytes([0x11; 20]));
        let explicit = format!("0x{}", "22".repeat(20));
        assert_eq!(
            sender(Some(&explicit), &config).unwrap(),
            Address::from_bytes([0x22; 20])
        );
    }

    #[test]
    fn test_resolve_call_by_arity() {
        let abi = Abi::parse(OVERLOADED).unwrap();

        let (signature, tokens) = resolve_call(&abi, "put", &["69".to_string()]).unwrap();
        assert_eq!(signature, "put(uint256)");
        assert_eq!(tokens, vec![Token::Uint(U256::from(69))]);

        let who = format!("0x{}", "ab".repeat(20));
        let (signature, _) = resolve_call(&abi, "put", &[who, "1".to_string()]).unwrap();
        assert_eq!(signature, "put(address,uint256)");

        let (signature, _) =
            resolve_call(&abi, "put(uint256)", &["7".to_string()]).unwrap();
        assert_eq!(signature, "put(uint256)");

        let (_, tokens) = resolve_call(&abi, "tag", &["hello".to_string()]).unwrap();
        assert_eq!(tokens, vec![Token::String("hello".into())]);
    }

    #[test]
    fn test_resolve_call_errors() {
        let abi = Abi::parse(OVERLOADED).unwrap();
        assert!(resolve_call(&abi, "missing", &[]).is_err());
        assert!(resolve_call(&abi, "put", &["not-a-number".to_string()]).is_err());
        assert!(resolve_call(&abi, "put", &[]).is_err());
    }
}
