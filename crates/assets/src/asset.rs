//! Asset records. The same layout travels in asset transactions, where
//! `balance` is the supply delta and `transfer_to` the new owner.

use paydayd_consensus::{Amount, Hash256};
use paydayd_primitives::encoding::{self, Decodable, DecodeError, Decoder, Encodable, Encoder};
use paydayd_primitives::{Transaction, WitnessAddress};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Asset {
    pub guid: u32,
    pub owner: WitnessAddress,
    /// One-shot instruction of a transfer; always null once stored.
    pub transfer_to: WitnessAddress,
    pub symbol: String,
    pub public_data: Vec<u8>,
    /// External bridge contract, empty or 20 bytes.
    pub contract: Vec<u8>,
    pub precision: u8,
    /// Issuer-held balance not yet sent to allocations.
    pub balance: Amount,
    pub total_supply: Amount,
    pub max_supply: Amount,
    pub update_flags: u8,
    pub height: u32,
    pub txid: Hash256,
}

impl Asset {
    pub fn is_null(&self) -> bool {
        self.guid == 0
    }

    pub fn set_null(&mut self) {
        *self = Asset::default();
    }

    /// Decodes the asset carried by the first data output of `tx`.
    pub fn from_tx(tx: &Transaction) -> Option<Self> {
        let data = tx.op_return_data()?;
        let asset: Asset = encoding::decode(&data).ok()?;
        (!asset.is_null()).then_some(asset)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encoding::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        encoding::decode(bytes)
    }
}

impl Encodable for Asset {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_u32_le(self.guid);
        self.owner.consensus_encode(encoder);
        self.transfer_to.consensus_encode(encoder);
        encoder.write_var_str(&self.symbol);
        encoder.write_var_bytes(&self.public_data);
        encoder.write_var_bytes(&self.contract);
        encoder.write_u8(self.precision);
        encoder.write_i64_le(self.balance);
        encoder.write_i64_le(self.total_supply);
        encoder.write_i64_le(self.max_supply);
        encoder.write_u8(self.update_flags);
        encoder.write_u32_le(self.height);
        encoder.write_hash_le(&self.txid);
    }
}

impl Decodable for Asset {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            guid: decoder.read_u32_le()?,
            owner: WitnessAddress::consensus_decode(decoder)?,
            transfer_to: WitnessAddress::consensus_decode(decoder)?,
            symbol: decoder.read_var_str()?,
            public_data: decoder.read_var_bytes()?,
            contract: decoder.read_var_bytes()?,
            precision: decoder.read_u8()?,
            balance: decoder.read_i64_le()?,
            total_supply: decoder.read_i64_le()?,
            max_supply: decoder.read_i64_le()?,
            update_flags: decoder.read_u8()?,
            height: decoder.read_u32_le()?,
            txid: decoder.read_hash_le()?,
        })
    }
}
