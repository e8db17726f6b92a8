//! ABI encoding

use conduit_primitives::{keccak256, H256, U256};

use super::types::{ParamType, Token};
use crate::error::{ClientError, Result};

/// Encode tokens using the types they carry
///
/// Integers are encoded as 256-bit; use [`encode_params`] when the
/// declared types are known.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let types: Vec<ParamType> = tokens.iter().map(|t| t.type_of()).collect();
    encode_unchecked(&types, tokens)
}

/// Encode tokens against declared parameter types
///
/// Fails if the argument count differs or a token does not fit its type.
pub fn encode_params(types: &[ParamType], tokens: &[Token]) -> Result<Vec<u8>> {
    if types.len() != tokens.len() {
        return Err(ClientError::AbiEncode(format!(
            "expected {} arguments, got {}",
            types.len(),
            tokens.len()
        )));
    }
    for (i, (param_type, token)) in types.iter().zip(tokens).enumerate() {
        if !token.type_check(param_type) {
            return Err(ClientError::AbiEncode(format!(
                "argument {} is {:?}, expected {}",
                i, token, param_type
            )));
        }
    }
    Ok(encode_unchecked(types, tokens))
}

/// Encode function call (selector + params)
pub fn encode_function_call(selector: [u8; 4], tokens: &[Token]) -> Vec<u8> {
    let mut result = selector.to_vec();
    result.extend(encode(tokens));
    result
}

fn encode_unchecked(types: &[ParamType], tokens: &[Token]) -> Vec<u8> {
    let head_size = types.iter().map(head_length).sum::<usize>();

    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();

    for (param_type, token) in types.iter().zip(tokens.iter()) {
        if param_type.is_dynamic() {
            let offset = head_size + tail.len();
            head.extend(encode_u256(&U256::from(offset)));
            tail.extend(encode_token(param_type, token));
        } else {
            head.extend(encode_token(param_type, token));
        }
    }

    head.extend(tail);
    head
}

/// Bytes a type occupies in the head section
pub(crate) fn head_length(param_type: &ParamType) -> usize {
    match param_type {
        ParamType::FixedArray(inner, size) if !inner.is_dynamic() => head_length(inner) * size,
        ParamType::Tuple(types) if !param_type.is_dynamic() => types.iter().map(head_length).sum(),
        _ => 32,
    }
}

fn encode_token(param_type: &ParamType, token: &Token) -> Vec<u8> {
    match (param_type, token) {
        (ParamType::Address, Token::Address(addr)) => {
            let mut buf = [0u8; 32];
            buf[12..32].copy_from_slice(addr.as_bytes());
            buf.to_vec()
        }
        (ParamType::Uint(_), Token::Uint(value)) => encode_u256(value),
        (ParamType::Int(_), Token::Int(value)) => {
            if value.negative {
                // two's complement
                let abs_bytes = u256_to_bytes(&value.abs);
                let mut bytes = [0u8; 32];
                for (dst, src) in bytes.iter_mut().zip(abs_bytes.iter()) {
                    *dst = !src;
                }
                let mut carry = 1u16;
                for byte in bytes.iter_mut().rev() {
                    let sum = (*byte as u16) + carry;
                    *byte = sum as u8;
                    carry = sum >> 8;
                }
                bytes.to_vec()
            } else {
                encode_u256(&value.abs)
            }
        }
        (ParamType::Bool, Token::Bool(b)) => {
            let mut buf = [0u8; 32];
            buf[31] = u8::from(*b);
            buf.to_vec()
        }
        (ParamType::FixedBytes(size), Token::FixedBytes(data)) => {
            let mut buf = [0u8; 32];
            let len = data.len().min(*size);
            buf[..len].copy_from_slice(&data[..len]);
            buf.to_vec()
        }
        (ParamType::Bytes, Token::Bytes(data)) => encode_bytes(data),
        (ParamType::String, Token::String(s)) => encode_bytes(s.as_bytes()),
        (ParamType::Array(inner), Token::Array(tokens)) => {
            let mut result = encode_u256(&U256::from(tokens.len()));
            let inner_types = vec![(**inner).clone(); tokens.len()];
            result.extend(encode_unchecked(&inner_types, tokens));
            result
        }
        (ParamType::FixedArray(inner, _), Token::FixedArray(tokens)) => {
            let inner_types = vec![(**inner).clone(); tokens.len()];
            encode_unchecked(&inner_types, tokens)
        }
        (ParamType::Tuple(types), Token::Tuple(tokens)) => encode_unchecked(types, tokens),
        _ => vec![0u8; 32],
    }
}

fn u256_to_bytes(value: &U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

fn encode_u256(value: &U256) -> Vec<u8> {
    u256_to_bytes(value).to_vec()
}

fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let mut result = encode_u256(&U256::from(data.len()));

    let padded_len = data.len().div_ceil(32) * 32;
    let mut padded = vec![0u8; padded_len];
    padded[..data.len()].copy_from_slice(data);
    result.extend(padded);

    result
}

/// Function selector: first 4 bytes of keccak256(signature)
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash.as_bytes()[..4]);
    selector
}

/// Event topic: keccak256(signature)
pub fn event_topic(signature: &str) -> H256 {
    keccak256(signature.as_bytes())
}

/// Topic value for an indexed event argument
///
/// Static values are their 32-byte encoding; dynamic values are hashed.
pub fn encode_topic(param_type: &ParamType, token: &Token) -> Result<H256> {
    if !token.type_check(param_type) {
        return Err(ClientError::AbiEncode(format!(
            "topic value {:?} is not a {}",
            token, param_type
        )));
    }
    let encoded = match (param_type, token) {
        (ParamType::String, Token::String(s)) => return Ok(keccak256(s.as_bytes())),
        (ParamType::Bytes, Token::Bytes(b)) => return Ok(keccak256(b)),
        _ if param_type.is_dynamic() => {
            return Ok(keccak256(&encode_unchecked(
                std::slice::from_ref(param_type),
                std::slice::from_ref(token),
            )))
        }
        _ => encode_token(param_type, token),
    };
    let mut word = [0u8; 32];
    word.copy_from_slice(&encoded[..32]);
    Ok(H256::from_bytes(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::types::{parse_type, I256};
    use conduit_primitives::Address;

    #[test]
    fn test_encode_address() {
        let addr = Address::from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
        let encoded = encode(&[Token::Address(addr)]);

        assert_eq!(encoded.len(), 32);
        assert_eq!(&encoded[12..32], addr.as_bytes());
        assert!(encoded[..12].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_uint_and_bool() {
        let encoded = encode(&[Token::Uint(U256::from(100)), Token::Bool(true)]);
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[31], 100);
        assert_eq!(encoded[63], 1);
    }

    #[test]
    fn test_encode_negative_int() {
        let encoded = encode_params(&[ParamType::Int(8)], &[Token::Int(I256::from_i128(-1))])
            .unwrap();
        assert!(encoded.iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_encode_dynamic_bytes() {
        let data = vec![0x01, 0x02, 0x03];
        let encoded = encode(&[Token::Bytes(data.clone())]);

        // offset + length + one padded word
        assert_eq!(encoded.len(), 96);
        assert_eq!(encoded[31], 32);
        assert_eq!(encoded[63], 3);
        assert_eq!(&encoded[64..67], &data[..]);
    }

    #[test]
    fn test_encode_mixed_static_dynamic() {
        // f(uint256,string) with (7, "hi")
        let encoded = encode_params(
            &[ParamType::Uint(256), ParamType::String],
            &[Token::Uint(U256::from(7)), Token::string("hi")],
        )
        .unwrap();
        assert_eq!(encoded.len(), 128);
        assert_eq!(encoded[31], 7);
        assert_eq!(encoded[63], 64);
        assert_eq!(encoded[95], 2);
        assert_eq!(&encoded[96..98], b"hi");
    }

    #[test]
    fn test_encode_params_validates() {
        let err = encode_params(&[ParamType::Uint(256)], &[]).unwrap_err();
        assert!(matches!(err, ClientError::AbiEncode(_)));

        let err = encode_params(&[ParamType::Uint(8)], &[Token::Uint(U256::from(1000))])
            .unwrap_err();
        assert!(matches!(err, ClientError::AbiEncode(_)));

        let err = encode_params(&[ParamType::Address], &[Token::Bool(true)]).unwrap_err();
        assert!(matches!(err, ClientError::AbiEncode(_)));
    }

    #[test]
    fn test_encode_dynamic_array() {
        let ty = parse_type("uint256[]").unwrap();
        let token = Token::Array(vec![Token::Uint(U256::from(1)), Token::Uint(U256::from(2))]);
        let encoded = encode_params(&[ty], &[token]).unwrap();
        // offset, length, two elements
        assert_eq!(encoded.len(), 128);
        assert_eq!(encoded[63], 2);
        assert_eq!(encoded[127], 2);
    }

    #[test]
    fn test_function_selector() {
        assert_eq!(
            function_selector("transfer(address,uint256)"),
            [0xa9, 0x05, 0x9c, 0xbb]
        );
        assert_eq!(function_selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn test_event_topic() {
        assert_eq!(
            event_topic("Transfer(address,address,uint256)").to_hex(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_encode_topic() {
        let topic = encode_topic(&ParamType::Uint(256), &Token::Uint(U256::from(5))).unwrap();
        assert_eq!(topic.as_bytes()[31], 5);

        let topic = encode_topic(&ParamType::String, &Token::string("abc")).unwrap();
        assert_eq!(topic, keccak256(b"abc"));
    }

    #[test]
    fn test_encode_function_call() {
        let to = Address::from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
        let selector = function_selector("transfer(address,uint256)");
        let encoded =
            encode_function_call(selector, &[Token::Address(to), Token::Uint(U256::from(1000))]);

        assert_eq!(encoded.len(), 68);
        assert_eq!(&encoded[..4], &selector);
    }
}
