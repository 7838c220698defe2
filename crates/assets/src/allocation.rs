use std::cmp::Ordering;
use std::fmt;

use paydayd_consensus::Amount;
use paydayd_primitives::encoding::{self, Decodable, DecodeError, Decoder, Encodable, Encoder};
use paydayd_primitives::{OutPoint, WitnessAddress};

/// Account key of the allocation ledger: one asset held by one address.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct AllocationTuple {
    pub guid: u32,
    pub address: WitnessAddress,
}

impl AllocationTuple {
    pub fn new(guid: u32, address: WitnessAddress) -> Self {
        Self { guid, address }
    }

    /// Synthetic sink credited by burns of `guid`.
    pub fn burn_sink(guid: u32) -> Self {
        Self::new(guid, WitnessAddress::burn())
    }

    pub fn is_null(&self) -> bool {
        self.guid == 0 && self.address.is_null()
    }

    /// Store key; the big-endian GUID groups all holders of one asset.
    pub fn key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(5 + self.address.program.len());
        key.extend_from_slice(&self.guid.to_be_bytes());
        key.push(self.address.version);
        key.extend_from_slice(&self.address.program);
        key
    }

    pub fn from_key(key: &[u8]) -> Option<Self> {
        if key.len() < 5 {
            return None;
        }
        let guid = u32::from_be_bytes(key[0..4].try_into().ok()?);
        Some(Self::new(guid, WitnessAddress::new(key[4], key[5..].to_vec())))
    }

    /// Parses the `guid-address` form produced by `Display`.
    pub fn parse(input: &str) -> Option<Self> {
        let (guid, address) = input.trim().split_once('-')?;
        Some(Self::new(guid.parse().ok()?, WitnessAddress::parse(address)?))
    }
}

impl fmt::Display for AllocationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.guid, self.address)
    }
}

impl Ord for AllocationTuple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl PartialOrd for AllocationTuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Encodable for AllocationTuple {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_u32_le(self.guid);
        self.address.consensus_encode(encoder);
    }
}

impl Decodable for AllocationTuple {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let guid = decoder.read_u32_le()?;
        let address = WitnessAddress::consensus_decode(decoder)?;
        Ok(Self { guid, address })
    }
}

pub(crate) fn encode_amounts(encoder: &mut Encoder, amounts: &[(WitnessAddress, Amount)]) {
    encoder.write_varint(amounts.len() as u64);
    for (address, amount) in amounts {
        address.consensus_encode(encoder);
        encoder.write_i64_le(*amount);
    }
}

pub(crate) fn decode_amounts(
    decoder: &mut Decoder,
) -> Result<Vec<(WitnessAddress, Amount)>, DecodeError> {
    let count = decoder.read_varint()?;
    let count = usize::try_from(count).map_err(|_| DecodeError::SizeTooLarge)?;
    let mut amounts = Vec::with_capacity(count.min(decoder.remaining()));
    for _ in 0..count {
        let address = WitnessAddress::consensus_decode(decoder)?;
        let amount = decoder.read_i64_le()?;
        amounts.push((address, amount));
    }
    Ok(amounts)
}

/// Balance record of one allocation tuple. A zero balance without a lock is
/// the null record and reads back as absent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AssetAllocation {
    pub tuple: AllocationTuple,
    pub pending_sends: Vec<(WitnessAddress, Amount)>,
    pub balance: Amount,
    /// Outpoint that the next allocation send of this tuple must spend.
    pub locked_outpoint: OutPoint,
}

impl AssetAllocation {
    pub fn new(tuple: AllocationTuple) -> Self {
        Self {
            tuple,
            ..Self::default()
        }
    }

    pub fn is_null(&self) -> bool {
        self.balance == 0 && self.locked_outpoint.is_null()
    }

    pub fn set_null(&mut self) {
        self.pending_sends.clear();
        self.locked_outpoint = OutPoint::null();
        self.balance = 0;
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encoding::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        encoding::decode(bytes)
    }
}

impl Encodable for AssetAllocation {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        self.tuple.consensus_encode(encoder);
        encode_amounts(encoder, &self.pending_sends);
        encoder.write_i64_le(self.balance);
        self.locked_outpoint.consensus_encode(encoder);
    }
}

impl Decodable for AssetAllocation {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            tuple: AllocationTuple::consensus_decode(decoder)?,
            pending_sends: decode_amounts(decoder)?,
            balance: decoder.read_i64_le()?,
            locked_outpoint: OutPoint::consensus_decode(decoder)?,
        })
    }
}
