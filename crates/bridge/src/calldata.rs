//! Decoding of the external bridge contract's burn call.
//!
//! Layout after the 4-byte selector: word 0 is the burned amount (uint256),
//! word 1 the destination asset GUID (uint32, right aligned), word 2 the offset
//! of the destination bytes and word 3 their length. The destination bytes are
//! one witness version byte followed by the witness program.

use std::fmt;

use primitive_types::U256;

use paydayd_primitives::WitnessAddress;

const WORD: usize = 32;
const SELECTOR_LEN: usize = 4;
const AMOUNT_OFFSET: usize = SELECTOR_LEN;
const ASSET_OFFSET: usize = SELECTOR_LEN + WORD * 2 - 4;
const DESTINATION_LEN_OFFSET: usize = SELECTOR_LEN + WORD * 4 - 1;
const DESTINATION_OFFSET: usize = DESTINATION_LEN_OFFSET + 1;
const MIN_DESTINATION_LEN: usize = 3;
const MAX_DESTINATION_LEN: usize = 41;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BurnCall {
    pub amount: i64,
    pub asset_guid: u32,
    pub destination: WitnessAddress,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallDataError {
    TooShort,
    SelectorMismatch,
    AmountOutOfRange,
    InvalidDestination,
}

impl fmt::Display for CallDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallDataError::TooShort => write!(f, "burn call data too short"),
            CallDataError::SelectorMismatch => write!(f, "burn call selector mismatch"),
            CallDataError::AmountOutOfRange => write!(f, "burn amount out of range"),
            CallDataError::InvalidDestination => write!(f, "invalid burn destination"),
        }
    }
}

impl std::error::Error for CallDataError {}

pub fn parse_burn_call(data: &[u8], selector: &[u8; 4]) -> Result<BurnCall, CallDataError> {
    if data.len() <= DESTINATION_OFFSET {
        return Err(CallDataError::TooShort);
    }
    if &data[..SELECTOR_LEN] != selector {
        return Err(CallDataError::SelectorMismatch);
    }

    let amount = U256::from_big_endian(&data[AMOUNT_OFFSET..AMOUNT_OFFSET + WORD]);
    if amount > U256::from(i64::MAX as u64) {
        return Err(CallDataError::AmountOutOfRange);
    }
    let amount = amount.low_u64() as i64;

    let asset_guid = u32::from_be_bytes([
        data[ASSET_OFFSET],
        data[ASSET_OFFSET + 1],
        data[ASSET_OFFSET + 2],
        data[ASSET_OFFSET + 3],
    ]);

    let destination_len = usize::from(data[DESTINATION_LEN_OFFSET]);
    if !(MIN_DESTINATION_LEN..=MAX_DESTINATION_LEN).contains(&destination_len) {
        return Err(CallDataError::InvalidDestination);
    }
    let destination = data
        .get(DESTINATION_OFFSET..DESTINATION_OFFSET + destination_len)
        .ok_or(CallDataError::TooShort)?;
    let address = WitnessAddress::new(destination[0], destination[1..].to_vec());
    if !address.is_valid() {
        return Err(CallDataError::InvalidDestination);
    }

    Ok(BurnCall {
        amount,
        asset_guid,
        destination: address,
    })
}

/// ABI encoding of a burn call; the inverse of [`parse_burn_call`].
pub fn encode_burn_call(selector: &[u8; 4], call: &BurnCall) -> Vec<u8> {
    let mut destination = vec![call.destination.version];
    destination.extend_from_slice(&call.destination.program);

    let mut data = selector.to_vec();
    data.extend_from_slice(&U256::from(call.amount.max(0) as u64).to_big_endian());
    let mut word = [0u8; WORD];
    word[WORD - 4..].copy_from_slice(&call.asset_guid.to_be_bytes());
    data.extend_from_slice(&word);
    let mut word = [0u8; WORD];
    word[WORD - 1] = (WORD * 3) as u8;
    data.extend_from_slice(&word);
    let mut word = [0u8; WORD];
    word[WORD - 1] = destination.len() as u8;
    data.extend_from_slice(&word);
    let padded = destination.len().div_ceil(WORD) * WORD;
    destination.resize(padded, 0);
    data.extend_from_slice(&destination);
    data
}
