//! Minimal contract-call codec: the handful of Solidity types the registry contracts use.
//!
//! Values are limited to `uint256` fitting in a `u128`, `address`, `bool`, `string` and
//! `uint256[]`. Arguments and return values are flat (no nested tuples).

use hodlerfc::model::Address;
use sha3::{Digest, Keccak256};

const WORD: usize = 32;

/// A Solidity value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// `uint256`.
    Uint(u128),
    /// `address`.
    Address(Address),
    /// `bool`.
    Bool(bool),
    /// `string`.
    String(String),
    /// `uint256[]`.
    UintArray(Vec<u128>),
}

/// Solidity type of a return value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// `uint256`.
    Uint,
    /// `address`.
    Address,
    /// `bool`.
    Bool,
    /// `string`.
    String,
    /// `uint256[]`.
    UintArray,
}

/// First four bytes of the Keccak-256 of the function signature, e.g. `"getCard(uint256)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode calldata: selector followed by the encoded `args`.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(encode(args));
    data
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Encode `tokens` as a flat argument list (head/tail layout).
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(tokens.len() * WORD);
    let mut tail = Vec::new();
    for token in tokens {
        match token {
            Token::Uint(value) => head.extend(uint_word(*value)),
            Token::Address(address) => {
                let mut word = [0; WORD];
                word[12..].copy_from_slice(&address.0);
                head.extend(word);
            }
            Token::Bool(value) => head.extend(uint_word(u128::from(*value))),
            Token::String(s) => {
                head.extend(uint_word((tokens.len() * WORD + tail.len()) as u128));
                tail.extend(uint_word(s.len() as u128));
                tail.extend(s.as_bytes());
                tail.resize(tail.len().next_multiple_of(WORD), 0);
            }
            Token::UintArray(values) => {
                head.extend(uint_word((tokens.len() * WORD + tail.len()) as u128));
                tail.extend(uint_word(values.len() as u128));
                for value in values {
                    tail.extend(uint_word(*value));
                }
            }
        }
    }
    head.extend(tail);
    head
}

fn word_at(data: &[u8], offset: usize) -> Result<&[u8], String> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| format!("Return data too short: no word at byte {}.", offset))
}

fn uint_at(data: &[u8], offset: usize) -> Result<u128, String> {
    let word = word_at(data, offset)?;
    if word[..16].iter().any(|&b| b != 0) {
        return Err(format!("uint256 at byte {} overflows u128.", offset));
    }
    let mut bytes = [0; 16];
    bytes.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(bytes))
}

fn usize_at(data: &[u8], offset: usize) -> Result<usize, String> {
    let value = uint_at(data, offset)?;
    usize::try_from(value).map_err(|_| format!("Length/offset {} at byte {} too large.", value, offset))
}

/// Decode flat return `data` according to `types`.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, String> {
    types
        .iter()
        .enumerate()
        .map(|(i, param)| {
            let head = i * WORD;
            Ok(match param {
                ParamType::Uint => Token::Uint(uint_at(data, head)?),
                ParamType::Address => {
                    let word = word_at(data, head)?;
                    let mut address = [0; 20];
                    address.copy_from_slice(&word[12..]);
                    Token::Address(Address(address))
                }
                ParamType::Bool => Token::Bool(uint_at(data, head)? != 0),
                ParamType::String => {
                    let offset = usize_at(data, head)?;
                    let len = usize_at(data, offset)?;
                    let start = offset + WORD;
                    let bytes = start
                        .checked_add(len)
                        .and_then(|end| data.get(start..end))
                        .ok_or_else(|| format!("String at byte {} truncated.", offset))?;
                    let s = String::from_utf8(bytes.to_vec())
                        .map_err(|e| format!("String at byte {} not UTF-8: {}", offset, e))?;
                    Token::String(s)
                }
                ParamType::UintArray => {
                    let offset = usize_at(data, head)?;
                    let len = usize_at(data, offset)?;
                    let values = (0..len)
                        .map(|j| uint_at(data, offset + WORD * (j + 1)))
                        .collect::<Result<Vec<_>, _>>()?;
                    Token::UintArray(values)
                }
            })
        })
        .collect()
}

impl Token {
    /// The `uint256` value, or an error naming `what`.
    pub fn into_uint(self, what: &str) -> Result<u128, String> {
        match self {
            Self::Uint(value) => Ok(value),
            other => Err(format!("Expected uint for `{}`, got {:?}.", what, other)),
        }
    }

    /// The `address` value, or an error naming `what`.
    pub fn into_address(self, what: &str) -> Result<Address, String> {
        match self {
            Self::Address(value) => Ok(value),
            other => Err(format!("Expected address for `{}`, got {:?}.", what, other)),
        }
    }

    /// The `bool` value, or an error naming `what`.
    pub fn into_bool(self, what: &str) -> Result<bool, String> {
        match self {
            Self::Bool(value) => Ok(value),
            other => Err(format!("Expected bool for `{}`, got {:?}.", what, other)),
        }
    }

    /// The `string` value, or an error naming `what`.
    pub fn into_string(self, what: &str) -> Result<String, String> {
        match self {
            Self::String(value) => Ok(value),
            other => Err(format!("Expected string for `{}`, got {:?}.", what, other)),
        }
    }

    /// The `uint256[]` value, or an error naming `what`.
    pub fn into_uint_array(self, what: &str) -> Result<Vec<u128>, String> {
        match self {
            Self::UintArray(value) => Ok(value),
            other => Err(format!("Expected uint[] for `{}`, got {:?}.", what, other)),
        }
    }
}
