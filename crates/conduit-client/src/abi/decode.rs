//! ABI decoding
//!
//! Offsets of dynamic values are relative to the start of the enclosing
//! encoding, so nested arrays and tuples decode against their own slice.

use conduit_primitives::{Address, U256};

use super::encode::head_length;
use super::types::{ParamType, Token, I256};
use crate::error::{ClientError, Result};

/// Decode tokens from ABI-encoded data
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>> {
    let mut offset = 0;
    let mut tokens = Vec::with_capacity(types.len());

    for param_type in types {
        let token = if param_type.is_dynamic() {
            let tail = read_offset(data, offset)?;
            decode_in_place(param_type, &data[tail..])?
        } else {
            decode_in_place(param_type, &data[offset.min(data.len())..])?
        };
        tokens.push(token);
        offset += head_length(param_type);
    }

    Ok(tokens)
}

/// Decode function output, returning a single token unwrapped
pub fn decode_output(types: &[ParamType], data: &[u8]) -> Result<Token> {
    let tokens = decode(types, data)?;
    if tokens.len() == 1 {
        tokens
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::AbiDecode("empty output".into()))
    } else {
        Ok(Token::Tuple(tokens))
    }
}

/// Decode a value whose encoding starts at `data[0]`
fn decode_in_place(param_type: &ParamType, data: &[u8]) -> Result<Token> {
    match param_type {
        ParamType::Address => {
            let word = read_word(data, 0)?;
            let mut addr_bytes = [0u8; 20];
            addr_bytes.copy_from_slice(&word[12..32]);
            Ok(Token::Address(Address::from_bytes(addr_bytes)))
        }
        ParamType::Uint(_) => Ok(Token::Uint(U256::from_big_endian(read_word(data, 0)?))),
        ParamType::Int(_) => {
            let bytes = read_word(data, 0)?;
            let negative = bytes[0] & 0x80 != 0;
            let abs = if negative {
                let mut flipped = [0u8; 32];
                for (dst, src) in flipped.iter_mut().zip(bytes.iter()) {
                    *dst = !src;
                }
                let mut carry = 1u16;
                for byte in flipped.iter_mut().rev() {
                    let sum = (*byte as u16) + carry;
                    *byte = sum as u8;
                    carry = sum >> 8;
                }
                U256::from_big_endian(&flipped)
            } else {
                U256::from_big_endian(bytes)
            };
            Ok(Token::Int(I256::new(abs, negative)))
        }
        ParamType::Bool => Ok(Token::Bool(read_word(data, 0)?[31] != 0)),
        ParamType::FixedBytes(size) => {
            let word = read_word(data, 0)?;
            Ok(Token::FixedBytes(word[..*size].to_vec()))
        }
        ParamType::Bytes => Ok(Token::Bytes(read_bytes(data)?)),
        ParamType::String => {
            let bytes = read_bytes(data)?;
            let s = String::from_utf8(bytes)
                .map_err(|e| ClientError::AbiDecode(format!("Invalid UTF-8: {}", e)))?;
            Ok(Token::String(s))
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, 0)?;
            // every element takes at least one head word
            if len > data.len() / 32 {
                return Err(ClientError::AbiDecode(format!(
                    "array length {} exceeds available data",
                    len
                )));
            }
            let types = vec![(**inner).clone(); len];
            Ok(Token::Array(decode(&types, &data[32..])?))
        }
        ParamType::FixedArray(inner, size) => {
            let types = vec![(**inner).clone(); *size];
            Ok(Token::FixedArray(decode(&types, data)?))
        }
        ParamType::Tuple(types) => Ok(Token::Tuple(decode(types, data)?)),
    }
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(32)
        .ok_or_else(|| ClientError::AbiDecode("offset overflow".into()))?;
    check_length(data, end)?;
    Ok(&data[offset..end])
}

fn read_usize(data: &[u8], offset: usize) -> Result<usize> {
    let value = U256::from_big_endian(read_word(data, offset)?);
    if value.bits() > 32 {
        return Err(ClientError::AbiDecode(format!("length or offset too large: {}", value)));
    }
    Ok(value.low_u64() as usize)
}

fn read_offset(data: &[u8], head_offset: usize) -> Result<usize> {
    let offset = read_usize(data, head_offset)?;
    check_length(data, offset)?;
    Ok(offset)
}

fn read_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let len = read_usize(data, 0)?;
    check_length(data, 32 + len)?;
    Ok(data[32..32 + len].to_vec())
}

fn check_length(data: &[u8], required: usize) -> Result<()> {
    if data.len() < required {
        Err(ClientError::AbiDecode(format!(
            "Data too short: need {} bytes, have {}",
            required,
            data.len()
        )))
    } else {
        Ok(())
    }
}
