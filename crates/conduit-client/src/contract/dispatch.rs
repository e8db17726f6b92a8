//! Dispatch table built from an ABI at bind time

use std::collections::{BTreeMap, HashMap};

use crate::abi::{decode, encode_params, FunctionDescriptor, Token};
use crate::error::{ClientError, Result};

/// One callable function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEntry {
    /// Canonical signature
    pub signature: String,
    /// Selector derived from the signature
    pub selector: [u8; 4],
    /// The ABI entry
    pub function: FunctionDescriptor,
}

impl DispatchEntry {
    fn new(function: FunctionDescriptor) -> Self {
        Self {
            signature: function.signature(),
            selector: function.selector(),
            function,
        }
    }

    /// Selector followed by the encoded arguments, checked against the inputs
    pub fn encode_call(&self, args: &[Token]) -> Result<Vec<u8>> {
        let encoded = encode_params(&self.function.input_types(), args).map_err(|e| match e {
            ClientError::AbiEncode(msg) => {
                ClientError::AbiEncode(format!("{}: {}", self.signature, msg))
            }
            other => other,
        })?;
        let mut data = self.selector.to_vec();
        data.extend(encoded);
        Ok(data)
    }

    /// Decode return data against the outputs
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Token>> {
        decode(&self.function.output_types(), data)
    }

    /// Whether the function is answered by `eth_call`
    pub fn is_read_only(&self) -> bool {
        self.function.is_read_only()
    }
}

/// Functions of one contract, addressable by name, signature or selector
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    entries: Vec<DispatchEntry>,
    by_name: HashMap<String, Vec<usize>>,
    by_selector: HashMap<[u8; 4], usize>,
}

impl DispatchTable {
    /// Build from ABI functions
    ///
    /// When the compiler reported its own selectors, each must agree with
    /// the derived one.
    pub fn build(
        functions: &[FunctionDescriptor],
        reported: Option<&BTreeMap<String, String>>,
    ) -> Result<Self> {
        let mut table = DispatchTable::default();
        for function in functions {
            let entry = DispatchEntry::new(function.clone());

            if let Some(reported) = reported.and_then(|ids| ids.get(&entry.signature)) {
                let derived = hex::encode(entry.selector);
                let normalized = reported.trim_start_matches("0x").to_ascii_lowercase();
                if normalized != derived {
                    return Err(ClientError::SelectorMismatch {
                        signature: entry.signature,
                        derived,
                        reported: normalized,
                    });
                }
            }

            let index = table.entries.len();
            table
                .by_name
                .entry(function.name.clone())
                .or_default()
                .push(index);
            table.by_selector.insert(entry.selector, index);
            table.entries.push(entry);
        }
        Ok(table)
    }

    /// Entries in ABI order
    pub fn entries(&self) -> &[DispatchEntry] {
        &self.entries
    }

    /// Entry with `selector`
    pub fn by_selector(&self, selector: &[u8; 4]) -> Option<&DispatchEntry> {
        self.by_selector.get(selector).map(|i| &self.entries[*i])
    }

    /// Pick the function for `name` and `args`
    ///
    /// `name` is a bare name or a full signature. Overloads are told apart by
    /// argument count and types.
    pub fn resolve(&self, name: &str, args: &[Token]) -> Result<&DispatchEntry> {
        if name.contains('(') {
            return self
                .entries
                .iter()
                .find(|e| e.signature == name)
                .ok_or_else(|| ClientError::UnknownFunction(name.to_string()));
        }

        let candidates = self
            .by_name
            .get(name)
            .ok_or_else(|| ClientError::UnknownFunction(name.to_string()))?;
        if let [only] = candidates.as_slice() {
            return Ok(&self.entries[*only]);
        }

        let fitting: Vec<&DispatchEntry> = candidates
            .iter()
            .map(|i| &self.entries[*i])
            .filter(|e| {
                e.function.inputs.len() == args.len()
                    && e.function
                        .inputs
                        .iter()
                        .zip(args)
                        .all(|(p, a)| a.type_check(&p.kind))
            })
            .collect();
        match fitting.as_slice() {
            [entry] => Ok(*entry),
            [] => Err(ClientError::UnknownFunction(format!(
                "no overload of {} takes {} such arguments",
                name,
                args.len()
            ))),
            many => Err(ClientError::UnknownFunction(format!(
                "{} is ambiguous between {}",
                name,
                many.iter()
                    .map(|e| e.signature.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::Abi;
    use conduit_primitives::{Address, U256};

    fn abi() -> Abi {
        Abi::parse(
            r#"[
            {"type":"function","name":"getBuffer","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
            {"type":"function","name":"setBuffer","inputs":[{"name":"x","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"},
            {"type":"function","name":"pay","inputs":[{"name":"to","type":"address"}],"outputs":[],"stateMutability":"payable"},
            {"type":"function","name":"pay","inputs":[{"name":"to","type":"address"},{"name":"memo","type":"string"}],"outputs":[],"stateMutability":"payable"}
        ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_and_resolve() {
        let table = DispatchTable::build(&abi().functions, None).unwrap();
        assert_eq!(table.entries().len(), 4);

        let get = table.resolve("getBuffer", &[]).unwrap();
        assert!(get.is_read_only());
        assert_eq!(get.signature, "getBuffer()");
        assert_eq!(table.by_selector(&get.selector).unwrap().signature, "getBuffer()");
    }

    #[test]
    fn test_encode_call_validates_arguments() {
        let table = DispatchTable::build(&abi().functions, None).unwrap();
        let set = table.resolve("setBuffer", &[]).unwrap();

        let data = set.encode_call(&[Token::Uint(U256::from(69))]).unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &set.selector);
        assert_eq!(data[35], 69);

        assert!(matches!(set.encode_call(&[]), Err(ClientError::AbiEncode(_))));
        assert!(matches!(
            set.encode_call(&[Token::string("69")]),
            Err(ClientError::AbiEncode(_))
        ));
    }

    #[test]
    fn test_overload_resolution() {
        let table = DispatchTable::build(&abi().functions, None).unwrap();
        let one = table
            .resolve("pay", &[Token::Address(Address::ZERO)])
            .unwrap();
        assert_eq!(one.signature, "pay(address)");

        let two = table
            .resolve("pay", &[Token::Address(Address::ZERO), Token::string("rent")])
            .unwrap();
        assert_eq!(two.signature, "pay(address,string)");

        let by_sig = table.resolve("pay(address,string)", &[]).unwrap();
        assert_eq!(by_sig.signature, "pay(address,string)");

        assert!(matches!(
            table.resolve("pay", &[]),
            Err(ClientError::UnknownFunction(_))
        ));
        assert!(matches!(
            table.resolve("withdraw", &[]),
            Err(ClientError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_reported_selectors_must_match() {
        let mut reported = BTreeMap::new();
        reported.insert(
            "getBuffer()".to_string(),
            hex::encode(crate::abi::function_selector("getBuffer()")),
        );
        reported.insert("setBuffer(uint256)".to_string(), "0xDEADBEEF".to_string());

        match DispatchTable::build(&abi().functions, Some(&reported)) {
            Err(ClientError::SelectorMismatch {
                signature,
                reported,
                ..
            }) => {
                assert_eq!(signature, "setBuffer(uint256)");
                assert_eq!(reported, "deadbeef");
            }
            other => panic!("expected SelectorMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_reported_selectors_accepted_when_equal() {
        let reported = abi().method_identifiers();
        assert!(DispatchTable::build(&abi().functions, Some(&reported)).is_ok());
    }
}
