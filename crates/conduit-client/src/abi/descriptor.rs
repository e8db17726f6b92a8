//! Contract ABI descriptors parsed from compiler JSON
//!
//! Both the current `stateMutability` field and the older
//! `constant`/`payable` flags are understood.

use std::collections::BTreeMap;
use std::fmt;

use conduit_primitives::H256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::encode::{event_topic, function_selector};
use super::types::{parse_type, ParamType};
use crate::error::{ClientError, Result};

/// Whether a function may change state or receive value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    /// Reads nothing from state
    Pure,
    /// Reads state, never writes
    View,
    /// Writes state, rejects value
    #[serde(rename = "nonpayable")]
    NonPayable,
    /// Writes state, accepts value
    Payable,
}

impl StateMutability {
    /// Pure and view functions are answered by `eth_call`
    pub fn is_read_only(&self) -> bool {
        matches!(self, StateMutability::Pure | StateMutability::View)
    }

    fn from_legacy(constant: bool, payable: bool) -> Self {
        if constant {
            StateMutability::View
        } else if payable {
            StateMutability::Payable
        } else {
            StateMutability::NonPayable
        }
    }
}

impl fmt::Display for StateMutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateMutability::Pure => "pure",
            StateMutability::View => "view",
            StateMutability::NonPayable => "nonpayable",
            StateMutability::Payable => "payable",
        };
        f.write_str(s)
    }
}

/// A named, typed parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name (may be empty)
    pub name: String,
    /// Parameter type
    pub kind: ParamType,
    /// Indexed event argument
    pub indexed: bool,
}

/// A function entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// Function name
    pub name: String,
    /// Inputs in declaration order
    pub inputs: Vec<Param>,
    /// Outputs in declaration order
    pub outputs: Vec<Param>,
    /// Mutability
    pub state_mutability: StateMutability,
}

impl FunctionDescriptor {
    /// Canonical signature, e.g. `transfer(address,uint256)`
    pub fn signature(&self) -> String {
        canonical_signature(&self.name, &self.inputs)
    }

    /// 4-byte selector derived from the signature
    pub fn selector(&self) -> [u8; 4] {
        function_selector(&self.signature())
    }

    /// Input types
    pub fn input_types(&self) -> Vec<ParamType> {
        self.inputs.iter().map(|p| p.kind.clone()).collect()
    }

    /// Output types
    pub fn output_types(&self) -> Vec<ParamType> {
        self.outputs.iter().map(|p| p.kind.clone()).collect()
    }

    /// See [`StateMutability::is_read_only`]
    pub fn is_read_only(&self) -> bool {
        self.state_mutability.is_read_only()
    }
}

/// An event entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    /// Event name
    pub name: String,
    /// Inputs in declaration order
    pub inputs: Vec<Param>,
    /// Anonymous events have no signature topic
    pub anonymous: bool,
}

impl EventDescriptor {
    /// Canonical signature, e.g. `Transfer(address,address,uint256)`
    pub fn signature(&self) -> String {
        canonical_signature(&self.name, &self.inputs)
    }

    /// topic0 for this event
    pub fn topic(&self) -> H256 {
        event_topic(&self.signature())
    }
}

/// The constructor entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDescriptor {
    /// Constructor inputs
    pub inputs: Vec<Param>,
    /// Mutability
    pub state_mutability: StateMutability,
}

impl ConstructorDescriptor {
    /// Input types
    pub fn input_types(&self) -> Vec<ParamType> {
        self.inputs.iter().map(|p| p.kind.clone()).collect()
    }
}

/// Parsed contract interface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Abi {
    /// Functions in declaration order
    pub functions: Vec<FunctionDescriptor>,
    /// Events in declaration order
    pub events: Vec<EventDescriptor>,
    /// Constructor, if declared
    pub constructor: Option<ConstructorDescriptor>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<RawParam>,
    #[serde(default)]
    outputs: Vec<RawParam>,
    #[serde(rename = "stateMutability")]
    state_mutability: Option<StateMutability>,
    #[serde(default)]
    constant: bool,
    #[serde(default)]
    payable: bool,
    #[serde(default)]
    anonymous: bool,
}

#[derive(Deserialize)]
struct RawParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    components: Vec<RawParam>,
    #[serde(default)]
    indexed: bool,
}

fn default_entry_type() -> String {
    "function".to_string()
}

impl RawParam {
    fn into_param(self) -> Result<Param> {
        Ok(Param {
            kind: resolve_param_type(&self.kind, &self.components)?,
            name: self.name,
            indexed: self.indexed,
        })
    }
}

/// `tuple`, `tuple[]`, `tuple[2][]` take their members from `components`
fn resolve_param_type(kind: &str, components: &[RawParam]) -> Result<ParamType> {
    match kind.strip_prefix("tuple") {
        Some(suffix) => {
            let members = components
                .iter()
                .map(|c| resolve_param_type(&c.kind, &c.components))
                .collect::<Result<Vec<_>>>()?;
            let inner = ParamType::Tuple(members).to_string();
            parse_type(&format!("{}{}", inner, suffix))
        }
        None => parse_type(kind),
    }
}

fn convert_params(raw: Vec<RawParam>) -> Result<Vec<Param>> {
    raw.into_iter().map(RawParam::into_param).collect()
}

impl Abi {
    /// Parse ABI JSON text
    pub fn parse(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ClientError::Artifact(format!("ABI is not valid JSON: {}", e)))?;
        Self::from_value(&value)
    }

    /// Parse an ABI JSON array
    pub fn from_value(value: &Value) -> Result<Self> {
        let entries: Vec<RawEntry> = serde_json::from_value(value.clone())
            .map_err(|e| ClientError::Artifact(format!("malformed ABI: {}", e)))?;

        let mut abi = Abi::default();
        for entry in entries {
            let mutability = entry
                .state_mutability
                .unwrap_or_else(|| StateMutability::from_legacy(entry.constant, entry.payable));

            match entry.kind.as_str() {
                "function" => abi.functions.push(FunctionDescriptor {
                    name: entry.name,
                    inputs: convert_params(entry.inputs)?,
                    outputs: convert_params(entry.outputs)?,
                    state_mutability: mutability,
                }),
                "event" => abi.events.push(EventDescriptor {
                    name: entry.name,
                    inputs: convert_params(entry.inputs)?,
                    anonymous: entry.anonymous,
                }),
                "constructor" => {
                    abi.constructor = Some(ConstructorDescriptor {
                        inputs: convert_params(entry.inputs)?,
                        state_mutability: mutability,
                    })
                }
                // fallback, receive and error entries carry nothing to dispatch
                _ => {}
            }
        }
        Ok(abi)
    }

    /// First function named `name`
    pub fn function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Every overload named `name`
    pub fn functions_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a FunctionDescriptor> + 'a {
        self.functions.iter().filter(move |f| f.name == name)
    }

    /// First event named `name`
    pub fn event(&self, name: &str) -> Option<&EventDescriptor> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Event whose topic0 is `topic`
    pub fn event_by_topic(&self, topic: &H256) -> Option<&EventDescriptor> {
        self.events
            .iter()
            .find(|e| !e.anonymous && e.topic() == *topic)
    }

    /// Signature to hex selector, as solc's `methodIdentifiers` reports it
    pub fn method_identifiers(&self) -> BTreeMap<String, String> {
        self.functions
            .iter()
            .map(|f| (f.signature(), hex::encode(f.selector())))
            .collect()
    }
}

fn canonical_signature(name: &str, inputs: &[Param]) -> String {
    let types: Vec<String> = inputs.iter().map(|p| p.kind.to_string()).collect();
    format!("{}({})", name, types.join(","))
}
