//! Strict recursive-length-prefix decoding.
//!
//! Decoded items borrow from the input and keep their full raw encoding,
//! which trie verification hashes.

use std::fmt;

const MAX_DEPTH: usize = 64;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RlpError {
    UnexpectedEof,
    NonCanonical,
    TrailingBytes,
    TooDeep,
    ExpectedBytes,
    ExpectedList,
    IntegerTooLarge,
}

impl fmt::Display for RlpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlpError::UnexpectedEof => write!(f, "rlp: unexpected end of input"),
            RlpError::NonCanonical => write!(f, "rlp: non-canonical encoding"),
            RlpError::TrailingBytes => write!(f, "rlp: trailing bytes"),
            RlpError::TooDeep => write!(f, "rlp: nesting too deep"),
            RlpError::ExpectedBytes => write!(f, "rlp: expected byte string"),
            RlpError::ExpectedList => write!(f, "rlp: expected list"),
            RlpError::IntegerTooLarge => write!(f, "rlp: integer too large"),
        }
    }
}

impl std::error::Error for RlpError {}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RlpValue<'a> {
    Bytes(&'a [u8]),
    List(Vec<RlpItem<'a>>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RlpItem<'a> {
    /// Complete encoding of this item, header included.
    pub raw: &'a [u8],
    pub value: RlpValue<'a>,
}

impl<'a> RlpItem<'a> {
    pub fn is_list(&self) -> bool {
        matches!(self.value, RlpValue::List(_))
    }

    pub fn as_bytes(&self) -> Result<&'a [u8], RlpError> {
        match self.value {
            RlpValue::Bytes(bytes) => Ok(bytes),
            RlpValue::List(_) => Err(RlpError::ExpectedBytes),
        }
    }

    pub fn as_list(&self) -> Result<&[RlpItem<'a>], RlpError> {
        match &self.value {
            RlpValue::List(items) => Ok(items),
            RlpValue::Bytes(_) => Err(RlpError::ExpectedList),
        }
    }

    /// Big-endian unsigned integer without leading zeros.
    pub fn as_u64(&self) -> Result<u64, RlpError> {
        let bytes = self.as_bytes()?;
        if bytes.len() > 8 {
            return Err(RlpError::IntegerTooLarge);
        }
        if bytes.first() == Some(&0) {
            return Err(RlpError::NonCanonical);
        }
        Ok(bytes
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
    }

    pub fn as_u32(&self) -> Result<u32, RlpError> {
        u32::try_from(self.as_u64()?).map_err(|_| RlpError::IntegerTooLarge)
    }
}

/// Decodes exactly one item spanning the whole input.
pub fn decode(input: &[u8]) -> Result<RlpItem<'_>, RlpError> {
    let (item, used) = decode_item(input, 0)?;
    if used != input.len() {
        return Err(RlpError::TrailingBytes);
    }
    Ok(item)
}

/// Decodes a top-level list, returning its items.
pub fn decode_list(input: &[u8]) -> Result<Vec<RlpItem<'_>>, RlpError> {
    match decode(input)?.value {
        RlpValue::List(items) => Ok(items),
        RlpValue::Bytes(_) => Err(RlpError::ExpectedList),
    }
}

fn decode_item(input: &[u8], depth: usize) -> Result<(RlpItem<'_>, usize), RlpError> {
    if depth > MAX_DEPTH {
        return Err(RlpError::TooDeep);
    }
    let prefix = *input.first().ok_or(RlpError::UnexpectedEof)?;
    match prefix {
        0x00..=0x7f => Ok((
            RlpItem {
                raw: &input[..1],
                value: RlpValue::Bytes(&input[..1]),
            },
            1,
        )),
        0x80..=0xb7 => {
            let len = usize::from(prefix - 0x80);
            let payload = slice(input, 1, len)?;
            if len == 1 && payload[0] < 0x80 {
                return Err(RlpError::NonCanonical);
            }
            Ok((
                RlpItem {
                    raw: &input[..1 + len],
                    value: RlpValue::Bytes(payload),
                },
                1 + len,
            ))
        }
        0xb8..=0xbf => {
            let len_of_len = usize::from(prefix - 0xb7);
            let len = long_length(input, len_of_len)?;
            let payload = slice(input, 1 + len_of_len, len)?;
            let used = 1 + len_of_len + len;
            Ok((
                RlpItem {
                    raw: &input[..used],
                    value: RlpValue::Bytes(payload),
                },
                used,
            ))
        }
        0xc0..=0xf7 => {
            let len = usize::from(prefix - 0xc0);
            let payload = slice(input, 1, len)?;
            let items = decode_payload_items(payload, depth)?;
            Ok((
                RlpItem {
                    raw: &input[..1 + len],
                    value: RlpValue::List(items),
                },
                1 + len,
            ))
        }
        0xf8..=0xff => {
            let len_of_len = usize::from(prefix - 0xf7);
            let len = long_length(input, len_of_len)?;
            let payload = slice(input, 1 + len_of_len, len)?;
            let items = decode_payload_items(payload, depth)?;
            let used = 1 + len_of_len + len;
            Ok((
                RlpItem {
                    raw: &input[..used],
                    value: RlpValue::List(items),
                },
                used,
            ))
        }
    }
}

fn decode_payload_items(mut payload: &[u8], depth: usize) -> Result<Vec<RlpItem<'_>>, RlpError> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, used) = decode_item(payload, depth + 1)?;
        items.push(item);
        payload = &payload[used..];
    }
    Ok(items)
}

fn long_length(input: &[u8], len_of_len: usize) -> Result<usize, RlpError> {
    let bytes = slice(input, 1, len_of_len)?;
    if bytes[0] == 0 {
        return Err(RlpError::NonCanonical);
    }
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(RlpError::IntegerTooLarge);
    }
    let len = bytes
        .iter()
        .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));
    if len < 56 {
        return Err(RlpError::NonCanonical);
    }
    Ok(len)
}

fn slice(input: &[u8], start: usize, len: usize) -> Result<&[u8], RlpError> {
    let end = start.checked_add(len).ok_or(RlpError::UnexpectedEof)?;
    input.get(start..end).ok_or(RlpError::UnexpectedEof)
}

pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return vec![bytes[0]];
    }
    let mut out = encode_header(0x80, bytes.len());
    out.extend_from_slice(bytes);
    out
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len());
    encode_bytes(&bytes[first..])
}

/// Wraps already-encoded items into a list.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let len = items.iter().map(Vec::len).sum();
    let mut out = encode_header(0xc0, len);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

fn encode_header(offset: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        return vec![offset + len as u8];
    }
    let bytes = len.to_be_bytes();
    let first = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len());
    let len_bytes = &bytes[first..];
    let mut out = Vec::with_capacity(1 + len_bytes.len() + len);
    out.push(offset + 55 + len_bytes.len() as u8);
    out.extend_from_slice(len_bytes);
    out
}
