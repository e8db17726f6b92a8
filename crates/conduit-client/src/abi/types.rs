//! ABI type definitions

use std::fmt;

use conduit_primitives::{quantity, Address, H256, U256};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// Solidity ABI token types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Address (20 bytes)
    Address(Address),
    /// Unsigned integer (8-256 bits)
    Uint(U256),
    /// Signed integer (8-256 bits)
    Int(I256),
    /// Boolean
    Bool(bool),
    /// Dynamic bytes
    Bytes(Vec<u8>),
    /// Fixed-size bytes (1-32)
    FixedBytes(Vec<u8>),
    /// UTF-8 string
    String(String),
    /// Dynamic array
    Array(Vec<Token>),
    /// Fixed-size array
    FixedArray(Vec<Token>),
    /// Tuple (struct)
    Tuple(Vec<Token>),
}

/// Signed 256-bit integer as sign and magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct I256 {
    /// Absolute value
    pub abs: U256,
    /// Sign (true if negative)
    pub negative: bool,
}

impl I256 {
    /// Create a new I256; negative zero is normalised to zero
    pub fn new(abs: U256, negative: bool) -> Self {
        Self {
            abs,
            negative: negative && !abs.is_zero(),
        }
    }

    /// Create from i128
    pub fn from_i128(value: i128) -> Self {
        Self::new(U256::from(value.unsigned_abs()), value < 0)
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.abs.is_zero()
    }

    /// Whether the value fits a signed integer of `bits` width
    pub fn fits(&self, bits: usize) -> bool {
        if bits == 0 || bits > 256 {
            return false;
        }
        let limit = U256::one() << (bits - 1);
        if self.negative {
            self.abs <= limit
        } else {
            self.abs < limit
        }
    }
}

impl fmt::Display for I256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.abs)
        } else {
            write!(f, "{}", self.abs)
        }
    }
}

/// Solidity parameter types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Address
    Address,
    /// Unsigned integer with bit size (8, 16, ..., 256)
    Uint(usize),
    /// Signed integer with bit size
    Int(usize),
    /// Boolean
    Bool,
    /// Dynamic bytes
    Bytes,
    /// Fixed-size bytes (size 1-32)
    FixedBytes(usize),
    /// UTF-8 string
    String,
    /// Dynamic array
    Array(Box<ParamType>),
    /// Fixed-size array
    FixedArray(Box<ParamType>, usize),
    /// Tuple
    Tuple(Vec<ParamType>),
}

impl ParamType {
    /// Check if this type is dynamic (variable length)
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            ParamType::Tuple(types) => types.iter().any(|t| t.is_dynamic()),
            _ => false,
        }
    }

    /// Parse a canonical or shorthand type string
    ///
    /// Accepts `uint` / `int` aliases, `T[]`, `T[N]` and `(T1,T2)` tuples.
    pub fn parse(s: &str) -> Result<Self> {
        parse_type(s)
    }
}

/// Canonical form used in signatures (`uint` becomes `uint256`)
impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Address => write!(f, "address"),
            ParamType::Uint(bits) => write!(f, "uint{}", bits),
            ParamType::Int(bits) => write!(f, "int{}", bits),
            ParamType::Bool => write!(f, "bool"),
            ParamType::Bytes => write!(f, "bytes"),
            ParamType::FixedBytes(size) => write!(f, "bytes{}", size),
            ParamType::String => write!(f, "string"),
            ParamType::Array(inner) => write!(f, "{}[]", inner),
            ParamType::FixedArray(inner, size) => write!(f, "{}[{}]", inner, size),
            ParamType::Tuple(types) => {
                write!(f, "(")?;
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parse a type string (e.g., "uint256", "address[]", "(uint8,bool)")
pub fn parse_type(s: &str) -> Result<ParamType> {
    let s = s.trim();

    if let Some(head) = s.strip_suffix(']') {
        let open = head
            .rfind('[')
            .ok_or_else(|| ClientError::AbiEncode(format!("Unknown type: {}", s)))?;
        let inner = parse_type(&head[..open])?;
        let size = &head[open + 1..];
        if size.is_empty() {
            return Ok(ParamType::Array(Box::new(inner)));
        }
        let size: usize = size
            .parse()
            .map_err(|_| ClientError::AbiEncode(format!("Invalid array size: {}", size)))?;
        return Ok(ParamType::FixedArray(Box::new(inner), size));
    }

    if let Some(body) = s.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        if body.trim().is_empty() {
            return Ok(ParamType::Tuple(vec![]));
        }
        let members = split_top_level(body)
            .into_iter()
            .map(parse_type)
            .collect::<Result<Vec<_>>>()?;
        return Ok(ParamType::Tuple(members));
    }

    match s {
        "address" => return Ok(ParamType::Address),
        "bool" => return Ok(ParamType::Bool),
        "string" => return Ok(ParamType::String),
        "bytes" => return Ok(ParamType::Bytes),
        // Solidity aliases
        "byte" => return Ok(ParamType::FixedBytes(1)),
        "function" => return Ok(ParamType::FixedBytes(24)),
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("uint") {
        return Ok(ParamType::Uint(parse_int_width(s, rest)?));
    }

    if let Some(rest) = s.strip_prefix("int") {
        return Ok(ParamType::Int(parse_int_width(s, rest)?));
    }

    if let Some(rest) = s.strip_prefix("bytes") {
        let size: usize = rest
            .parse()
            .map_err(|_| ClientError::AbiEncode(format!("Invalid bytes size: {}", rest)))?;
        if !(1..=32).contains(&size) {
            return Err(ClientError::AbiEncode(format!("Invalid bytes size: {}", size)));
        }
        return Ok(ParamType::FixedBytes(size));
    }

    Err(ClientError::AbiEncode(format!("Unknown type: {}", s)))
}

fn parse_int_width(full: &str, rest: &str) -> Result<usize> {
    if rest.is_empty() {
        return Ok(256);
    }
    let bits: usize = rest
        .parse()
        .map_err(|_| ClientError::AbiEncode(format!("Invalid integer type: {}", full)))?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(ClientError::AbiEncode(format!("Invalid integer type: {}", full)));
    }
    Ok(bits)
}

/// Split on commas that are not nested inside parentheses
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

impl Token {
    /// Create an address token
    pub fn address(addr: Address) -> Self {
        Token::Address(addr)
    }

    /// Create a uint256 token
    pub fn uint256(value: U256) -> Self {
        Token::Uint(value)
    }

    /// Create a uint256 from u128
    pub fn uint256_from_u128(value: u128) -> Self {
        Token::Uint(U256::from(value))
    }

    /// Create a bool token
    pub fn bool(value: bool) -> Self {
        Token::Bool(value)
    }

    /// Create a bytes token
    pub fn bytes(data: Vec<u8>) -> Self {
        Token::Bytes(data)
    }

    /// Create a string token
    pub fn string(s: impl Into<String>) -> Self {
        Token::String(s.into())
    }

    /// Create a bytes32 token
    pub fn bytes32(data: H256) -> Self {
        Token::FixedBytes(data.as_bytes().to_vec())
    }

    /// Unsigned value, if this is a `Uint`
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Token::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// Address value, if this is an `Address`
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Token::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// Get the type of this token
    pub fn type_of(&self) -> ParamType {
        match self {
            Token::Address(_) => ParamType::Address,
            Token::Uint(_) => ParamType::Uint(256),
            Token::Int(_) => ParamType::Int(256),
            Token::Bool(_) => ParamType::Bool,
            Token::Bytes(_) => ParamType::Bytes,
            Token::FixedBytes(b) => ParamType::FixedBytes(b.len()),
            Token::String(_) => ParamType::String,
            Token::Array(tokens) => {
                let inner = tokens.first().map(|t| t.type_of()).unwrap_or(ParamType::Uint(256));
                ParamType::Array(Box::new(inner))
            }
            Token::FixedArray(tokens) => {
                let inner = tokens.first().map(|t| t.type_of()).unwrap_or(ParamType::Uint(256));
                ParamType::FixedArray(Box::new(inner), tokens.len())
            }
            Token::Tuple(tokens) => ParamType::Tuple(tokens.iter().map(|t| t.type_of()).collect()),
        }
    }

    /// Whether this token can be encoded as `param_type` without loss
    pub fn type_check(&self, param_type: &ParamType) -> bool {
        match (self, param_type) {
            (Token::Address(_), ParamType::Address) => true,
            (Token::Uint(v), ParamType::Uint(bits)) => v.bits() <= *bits,
            (Token::Int(v), ParamType::Int(bits)) => v.fits(*bits),
            (Token::Bool(_), ParamType::Bool) => true,
            (Token::Bytes(_), ParamType::Bytes) => true,
            (Token::FixedBytes(b), ParamType::FixedBytes(size)) => b.len() == *size,
            (Token::String(_), ParamType::String) => true,
            (Token::Array(items), ParamType::Array(inner)) => {
                items.iter().all(|t| t.type_check(inner))
            }
            (Token::FixedArray(items), ParamType::FixedArray(inner, size)) => {
                items.len() == *size && items.iter().all(|t| t.type_check(inner))
            }
            (Token::Tuple(items), ParamType::Tuple(types)) => {
                items.len() == types.len()
                    && items.iter().zip(types).all(|(t, ty)| t.type_check(ty))
            }
            _ => false,
        }
    }

    /// Build a token of `param_type` from its textual form
    ///
    /// Scalars take plain text (`42`, `0x2a`, `-7`, `true`, `0xabcd…`);
    /// arrays and tuples take JSON arrays.
    pub fn parse(param_type: &ParamType, text: &str) -> Result<Token> {
        match param_type {
            ParamType::Array(_) | ParamType::FixedArray(..) | ParamType::Tuple(_) => {
                let value: Value = serde_json::from_str(text).map_err(|e| {
                    ClientError::AbiEncode(format!("expected JSON array for {}: {}", param_type, e))
                })?;
                Token::from_json(param_type, &value)
            }
            _ => Token::from_json(param_type, &Value::String(text.to_string())),
        }
    }

    /// Build a token of `param_type` from a JSON value
    pub fn from_json(param_type: &ParamType, value: &Value) -> Result<Token> {
        let mismatch = || ClientError::AbiEncode(format!("cannot read {} as {}", value, param_type));

        let token = match param_type {
            ParamType::Address => {
                let s = value.as_str().ok_or_else(mismatch)?;
                Token::Address(Address::from_hex(s.trim())?)
            }
            ParamType::Uint(_) => Token::Uint(json_to_u256(value).ok_or_else(mismatch)?),
            ParamType::Int(_) => {
                let text = match value {
                    Value::String(s) => s.trim().to_string(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(mismatch()),
                };
                let (negative, digits) = match text.strip_prefix('-') {
                    Some(rest) => (true, rest.to_string()),
                    None => (false, text),
                };
                let abs = json_to_u256(&Value::String(digits)).ok_or_else(mismatch)?;
                Token::Int(I256::new(abs, negative))
            }
            ParamType::Bool => match value {
                Value::Bool(b) => Token::Bool(*b),
                Value::String(s) if s.trim() == "true" => Token::Bool(true),
                Value::String(s) if s.trim() == "false" => Token::Bool(false),
                _ => return Err(mismatch()),
            },
            ParamType::String => Token::String(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            ParamType::Bytes => {
                let s = value.as_str().ok_or_else(mismatch)?;
                Token::Bytes(quantity::parse_bytes(s)?)
            }
            ParamType::FixedBytes(_) => {
                let s = value.as_str().ok_or_else(mismatch)?;
                Token::FixedBytes(quantity::parse_bytes(s)?)
            }
            ParamType::Array(inner) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                Token::Array(
                    items
                        .iter()
                        .map(|v| Token::from_json(inner, v))
                        .collect::<Result<_>>()?,
                )
            }
            ParamType::FixedArray(inner, _) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                Token::FixedArray(
                    items
                        .iter()
                        .map(|v| Token::from_json(inner, v))
                        .collect::<Result<_>>()?,
                )
            }
            ParamType::Tuple(types) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                if items.len() != types.len() {
                    return Err(mismatch());
                }
                Token::Tuple(
                    items
                        .iter()
                        .zip(types)
                        .map(|(v, t)| Token::from_json(t, v))
                        .collect::<Result<_>>()?,
                )
            }
        };

        if !token.type_check(param_type) {
            return Err(ClientError::AbiEncode(format!(
                "value {} does not fit {}",
                value, param_type
            )));
        }
        Ok(token)
    }

    /// JSON rendering: integers as decimal strings, bytes as hex
    pub fn to_json(&self) -> Value {
        match self {
            Token::Address(a) => Value::String(a.to_hex()),
            Token::Uint(v) => Value::String(v.to_string()),
            Token::Int(v) => Value::String(v.to_string()),
            Token::Bool(b) => Value::Bool(*b),
            Token::Bytes(b) | Token::FixedBytes(b) => Value::String(quantity::bytes_to_hex(b)),
            Token::String(s) => Value::String(s.clone()),
            Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
                Value::Array(items.iter().map(Token::to_json).collect())
            }
        }
    }
}

fn json_to_u256(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => {
            let s = s.trim();
            if s.starts_with("0x") || s.starts_with("0X") {
                quantity::parse_u256(s).ok()
            } else if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                U256::from_dec_str(s).ok()
            } else {
                None
            }
        }
        _ => None,
    }
}
