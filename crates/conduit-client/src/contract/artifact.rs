//! Compiler output

use std::collections::BTreeMap;
use std::path::Path;

use conduit_primitives::quantity;
use serde_json::Value;

use crate::abi::Abi;
use crate::error::{ClientError, Result};
use crate::linker::{self, LinkTable};

/// Bytecode and ABI of one compiled contract or library
///
/// Bytecode is kept as hex text since unlinked code contains placeholders
/// that are not hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Qualified name, e.g. `MyLib.sol:MyLib`
    pub name: String,
    /// Hex bytecode, possibly with library placeholders
    pub bytecode: String,
    /// Contract interface
    pub abi: Abi,
    /// Compiler-reported selectors, signature to hex
    pub method_identifiers: Option<BTreeMap<String, String>>,
}

impl CompiledArtifact {
    /// Artifact from parts
    pub fn new(name: impl Into<String>, bytecode: impl Into<String>, abi: Abi) -> Self {
        Self {
            name: name.into(),
            bytecode: bytecode.into(),
            abi,
            method_identifiers: None,
        }
    }

    /// Single artifact JSON: `{"bytecode": .., "abi": [..]}`
    ///
    /// Also accepts `bin`, `interface` (ABI as a JSON string) and the
    /// standard-JSON `evm.bytecode.object` layout.
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ClientError::Artifact(format!("artifact is not valid JSON: {}", e)))?;
        Self::from_value(name.into(), &value)
    }

    /// Select `qualified` (`File.sol:Name`) from solc combined output
    ///
    /// A bare `Name` matches a single contract of that name in any file.
    pub fn from_solc_output(json: &str, qualified: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ClientError::Artifact(format!("compiler output is not valid JSON: {}", e)))?;
        let contracts = value
            .get("contracts")
            .and_then(Value::as_object)
            .ok_or_else(|| ClientError::Artifact("compiler output has no contracts".into()))?;

        let mut candidates: Vec<(String, &Value)> = Vec::new();
        for (key, entry) in contracts {
            // standard JSON nests contracts under their file
            let nested = entry
                .as_object()
                .filter(|obj| obj.values().all(Value::is_object) && !is_contract_entry(entry))
                .map(|obj| {
                    obj.iter()
                        .map(|(name, inner)| (format!("{}:{}", key, name), inner))
                        .collect::<Vec<_>>()
                });
            match nested {
                Some(inner) => candidates.extend(inner),
                None => candidates.push((key.clone(), entry)),
            }
        }

        if let Some((name, entry)) = candidates.iter().find(|(name, _)| name == qualified) {
            return Self::from_value(name.clone(), entry);
        }

        let suffix = format!(":{}", qualified);
        let matches: Vec<_> = candidates
            .iter()
            .filter(|(name, _)| !qualified.contains(':') && name.ends_with(&suffix))
            .collect();
        match matches.as_slice() {
            [(name, entry)] => Self::from_value(name.clone(), entry),
            [] => Err(ClientError::Artifact(format!(
                "contract {} not found in compiler output",
                qualified
            ))),
            _ => Err(ClientError::Artifact(format!(
                "contract name {} is ambiguous; use File.sol:Name",
                qualified
            ))),
        }
    }

    /// Load from a file
    ///
    /// With `contract`, the file is compiler output and `contract` selects
    /// an entry; otherwise it is a single artifact named after the file.
    pub fn load(path: &Path, contract: Option<&str>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Artifact(format!("{}: {}", path.display(), e)))?;
        match contract {
            Some(qualified) => Self::from_solc_output(&content, qualified),
            None => {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Self::from_json(name, &content)
            }
        }
    }

    fn from_value(name: String, value: &Value) -> Result<Self> {
        let bytecode = value
            .get("bytecode")
            .or_else(|| value.get("bin"))
            .or_else(|| value.pointer("/evm/bytecode/object"))
            .and_then(|b| match b {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj.get("object").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .ok_or_else(|| ClientError::Artifact(format!("{} has no bytecode", name)))?;

        let abi = match value.get("abi").or_else(|| value.get("interface")) {
            Some(Value::String(text)) => Abi::parse(text)?,
            Some(array @ Value::Array(_)) => Abi::from_value(array)?,
            _ => return Err(ClientError::Artifact(format!("{} has no ABI", name))),
        };

        let identifiers = value
            .get("methodIdentifiers")
            .or_else(|| value.get("functionHashes"))
            .or_else(|| value.pointer("/evm/methodIdentifiers"))
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(sig, sel)| sel.as_str().map(|s| (sig.clone(), s.to_string())))
                    .collect::<BTreeMap<_, _>>()
            });

        Ok(Self {
            name,
            bytecode: bytecode.trim().to_string(),
            abi,
            method_identifiers: identifiers,
        })
    }

    /// Library placeholders still present in the bytecode
    pub fn placeholders(&self) -> Vec<String> {
        linker::find_placeholders(&self.bytecode)
    }

    /// Whether the bytecode is free of placeholders
    pub fn is_linked(&self) -> bool {
        self.placeholders().is_empty()
    }

    /// Copy with the bytecode linked against `table`
    pub fn linked(&self, table: &LinkTable) -> Result<Self> {
        Ok(Self {
            bytecode: linker::link(&self.bytecode, table)?,
            ..self.clone()
        })
    }

    /// Bytecode as bytes; fails if it still has placeholders
    pub fn bytecode_bytes(&self) -> Result<Vec<u8>> {
        let placeholders = self.placeholders();
        if !placeholders.is_empty() {
            return Err(ClientError::UnresolvedLink {
                placeholders: placeholders.iter().map(|p| p.trim_matches('_').to_string()).collect(),
            });
        }
        let code = quantity::parse_bytes(&self.bytecode)?;
        if code.is_empty() {
            return Err(ClientError::Artifact(format!("{} has empty bytecode", self.name)));
        }
        Ok(code)
    }
}

/// Whether a compiler output entry is a contract rather than a file map
fn is_contract_entry(entry: &Value) -> bool {
    ["bytecode", "bin", "abi", "interface", "evm"]
        .iter()
        .any(|key| entry.get(key).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::legacy_placeholder;
    use conduit_primitives::Address;
    use serde_json::json;
    use std::io::Write;

    const ABI: &str = r#"[{"constant":true,"inputs":[],"name":"getBuffer","outputs":[{"name":"","type":"uint256"}],"type":"function"}]"#;

    #[test]
    fn test_from_json() {
        let json = json!({"bytecode": "0x6060", "abi": serde_json::from_str::<Value>(ABI).unwrap()});
        let artifact = CompiledArtifact::from_json("Debit", &json.to_string()).unwrap();
        assert_eq!(artifact.name, "Debit");
        assert_eq!(artifact.bytecode_bytes().unwrap(), vec![0x60, 0x60]);
        assert_eq!(artifact.abi.functions.len(), 1);
        assert!(artifact.is_linked());
    }

    #[test]
    fn test_from_solc_js_output() {
        let output = json!({
            "contracts": {
                "MyLib.sol:MyLib": {"bytecode": "6060", "interface": "[]"},
                "MyContract.sol:MyContract": {
                    "bytecode": format!("6060{}", legacy_placeholder("MyLib.sol:MyLib")),
                    "interface": ABI,
                    "functionHashes": {"getBuffer()": "9ac8fba4"}
                }
            }
        });
        let artifact =
            CompiledArtifact::from_solc_output(&output.to_string(), "MyContract.sol:MyContract")
                .unwrap();
        assert!(!artifact.is_linked());
        assert_eq!(
            artifact.method_identifiers.as_ref().unwrap()["getBuffer()"],
            "9ac8fba4"
        );
        assert!(matches!(
            artifact.bytecode_bytes(),
            Err(ClientError::UnresolvedLink { placeholders }) if placeholders == vec!["MyLib.sol:MyLib".to_string()]
        ));

        let table = LinkTable::new();
        table
            .insert("MyLib.sol:MyLib", Address::from_bytes([0x11; 20]))
            .unwrap();
        let linked = artifact.linked(&table).unwrap();
        assert!(linked.is_linked());
        assert_eq!(linked.bytecode_bytes().unwrap().len(), 22);
    }

    #[test]
    fn test_from_standard_json_output() {
        let output = json!({
            "contracts": {
                "Debit.sol": {
                    "Debit": {
                        "abi": serde_json::from_str::<Value>(ABI).unwrap(),
                        "evm": {
                            "bytecode": {"object": "6080"},
                            "methodIdentifiers": {"getBuffer()": "9ac8fba4"}
                        }
                    }
                }
            }
        });
        let artifact = CompiledArtifact::from_solc_output(&output.to_string(), "Debit").unwrap();
        assert_eq!(artifact.name, "Debit.sol:Debit");
        assert_eq!(artifact.bytecode, "6080");
        assert!(artifact.method_identifiers.is_some());
    }

    #[test]
    fn test_missing_contract() {
        let output = json!({"contracts": {}});
        let err = CompiledArtifact::from_solc_output(&output.to_string(), "Nope.sol:Nope")
            .unwrap_err();
        assert!(matches!(err, ClientError::Artifact(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"bin": "6060", "abi": {}}}"#, ABI).unwrap();

        let artifact = CompiledArtifact::load(file.path(), None).unwrap();
        assert_eq!(artifact.bytecode, "6060");
        assert!(!artifact.name.is_empty());
    }
}
