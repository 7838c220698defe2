//! Operation payloads carried in the first data output of ledger transactions.

use paydayd_consensus::constants::TX_VERSION_ALLOCATION_BURN;
use paydayd_consensus::{Amount, Hash256};
use paydayd_primitives::encoding::{self, Decodable, DecodeError, Decoder, Encodable, Encoder};
use paydayd_primitives::{OutPoint, Transaction, WitnessAddress};

use crate::allocation::{decode_amounts, encode_amounts, AllocationTuple};

/// Payload of asset sends and of allocation send, burn and lock. For asset
/// sends the tuple names the asset and its current owner.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AllocationPayload {
    pub tuple: AllocationTuple,
    pub receivers: Vec<(WitnessAddress, Amount)>,
    pub locked_outpoint: OutPoint,
}

impl AllocationPayload {
    /// Burns append [`BurnData`] after the payload; every other operation
    /// must carry nothing else.
    pub fn from_tx(tx: &Transaction) -> Option<Self> {
        let data = tx.op_return_data()?;
        let mut decoder = Decoder::new(&data);
        let payload = Self::consensus_decode(&mut decoder).ok()?;
        if tx.version != TX_VERSION_ALLOCATION_BURN && !decoder.is_empty() {
            return None;
        }
        (!payload.tuple.is_null()).then_some(payload)
    }

    pub fn total(&self) -> Option<Amount> {
        self.receivers
            .iter()
            .try_fold(0 as Amount, |sum, (_, amount)| sum.checked_add(*amount))
    }

    pub fn receiver_tuples(&self) -> impl Iterator<Item = AllocationTuple> + '_ {
        self.receivers
            .iter()
            .map(|(address, _)| AllocationTuple::new(self.tuple.guid, address.clone()))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encoding::encode(self)
    }
}

impl Encodable for AllocationPayload {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        self.tuple.consensus_encode(encoder);
        encode_amounts(encoder, &self.receivers);
        self.locked_outpoint.consensus_encode(encoder);
    }
}

impl Decodable for AllocationPayload {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            tuple: AllocationTuple::consensus_decode(decoder)?,
            receivers: decode_amounts(decoder)?,
            locked_outpoint: OutPoint::consensus_decode(decoder)?,
        })
    }
}

/// Burn instruction following the allocation payload of a burn.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BurnData {
    pub guid: u32,
    pub address: WitnessAddress,
    pub amount: Amount,
    /// Recipient on the external chain.
    pub external_address: [u8; 20],
}

impl BurnData {
    pub fn from_tx(tx: &Transaction) -> Option<Self> {
        let data = tx.op_return_data()?;
        let mut decoder = Decoder::new(&data);
        AllocationPayload::consensus_decode(&mut decoder).ok()?;
        let burn = Self::consensus_decode(&mut decoder).ok()?;
        decoder.is_empty().then_some(burn)
    }
}

impl Encodable for BurnData {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_u32_le(self.guid);
        self.address.consensus_encode(encoder);
        encoder.write_i64_le(self.amount);
        encoder.write_bytes(&self.external_address);
    }
}

impl Decodable for BurnData {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            guid: decoder.read_u32_le()?,
            address: WitnessAddress::consensus_decode(decoder)?,
            amount: decoder.read_i64_le()?,
            external_address: decoder.read_fixed::<20>()?,
        })
    }
}

/// Bridge mint: SPV proofs of an external burn transaction and its receipt.
/// The tuple is null for base-coin mints.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MintPayload {
    pub tuple: AllocationTuple,
    pub value_asset: Amount,
    pub block_number: u32,
    pub tx_value: Vec<u8>,
    pub tx_parent_nodes: Vec<u8>,
    pub tx_root: Hash256,
    /// RLP-encoded transaction index; also the trie key of both proofs.
    pub tx_path: Vec<u8>,
    pub receipt_value: Vec<u8>,
    pub receipt_parent_nodes: Vec<u8>,
    pub receipt_root: Hash256,
}

impl MintPayload {
    pub fn is_null(&self) -> bool {
        self.tx_value.is_empty() && self.receipt_value.is_empty()
    }

    pub fn from_tx(tx: &Transaction) -> Option<Self> {
        let data = tx.op_return_data()?;
        let payload: MintPayload = encoding::decode(&data).ok()?;
        (!payload.is_null()).then_some(payload)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encoding::encode(self)
    }
}

impl Encodable for MintPayload {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        self.tuple.consensus_encode(encoder);
        encoder.write_i64_le(self.value_asset);
        encoder.write_u32_le(self.block_number);
        encoder.write_var_bytes(&self.tx_value);
        encoder.write_var_bytes(&self.tx_parent_nodes);
        encoder.write_hash_le(&self.tx_root);
        encoder.write_var_bytes(&self.tx_path);
        encoder.write_var_bytes(&self.receipt_value);
        encoder.write_var_bytes(&self.receipt_parent_nodes);
        encoder.write_hash_le(&self.receipt_root);
    }
}

impl Decodable for MintPayload {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            tuple: AllocationTuple::consensus_decode(decoder)?,
            value_asset: decoder.read_i64_le()?,
            block_number: decoder.read_u32_le()?,
            tx_value: decoder.read_var_bytes()?,
            tx_parent_nodes: decoder.read_var_bytes()?,
            tx_root: decoder.read_hash_le()?,
            tx_path: decoder.read_var_bytes()?,
            receipt_value: decoder.read_var_bytes()?,
            receipt_parent_nodes: decoder.read_var_bytes()?,
            receipt_root: decoder.read_hash_le()?,
        })
    }
}

/// Payload bytes of a burn: the allocation payload followed by the burn data.
pub fn burn_payload_bytes(payload: &AllocationPayload, burn: &BurnData) -> Vec<u8> {
    let mut encoder = Encoder::new();
    payload.consensus_encode(&mut encoder);
    burn.consensus_encode(&mut encoder);
    encoder.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use paydayd_consensus::constants::TX_VERSION_ALLOCATION_SEND;
    use paydayd_primitives::script::op_return_script;
    use paydayd_primitives::{TxIn, TxOut};

    fn tx_with(version: i32, data: &[u8]) -> Transaction {
        Transaction {
            version,
            vin: vec![TxIn::spending(OutPoint::new([9; 32], 0))],
            vout: vec![TxOut {
                value: 0,
                script_pubkey: op_return_script(data),
            }],
            lock_time: 0,
        }
    }

    fn payload() -> AllocationPayload {
        AllocationPayload {
            tuple: AllocationTuple::new(700_000_000, WitnessAddress::new(0, vec![0x42; 20])),
            receivers: vec![(WitnessAddress::new(0, vec![0x43; 20]), 25)],
            locked_outpoint: OutPoint::null(),
        }
    }

    #[test]
    fn burn_data_follows_payload() {
        let burn = BurnData {
            guid: 700_000_000,
            address: WitnessAddress::new(0, vec![0x42; 20]),
            amount: 10,
            external_address: [0xee; 20],
        };
        let bytes = burn_payload_bytes(&payload(), &burn);
        let tx = tx_with(TX_VERSION_ALLOCATION_BURN, &bytes);
        assert_eq!(AllocationPayload::from_tx(&tx), Some(payload()));
        assert_eq!(BurnData::from_tx(&tx), Some(burn));

        let send = tx_with(TX_VERSION_ALLOCATION_SEND, &bytes);
        assert_eq!(AllocationPayload::from_tx(&send), None);
    }

    #[test]
    fn receiver_total_detects_overflow() {
        let mut payload = payload();
        assert_eq!(payload.total(), Some(25));
        payload.receivers.push((WitnessAddress::new(0, vec![1; 20]), i64::MAX));
        assert_eq!(payload.total(), None);
    }
}
