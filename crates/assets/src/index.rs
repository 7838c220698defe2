//! Optional txid history per asset and per allocation tuple.

use paydayd_consensus::constants::{
    TX_VERSION_ALLOCATION_BURN, TX_VERSION_ALLOCATION_LOCK, TX_VERSION_ALLOCATION_MINT,
    TX_VERSION_ALLOCATION_SEND, TX_VERSION_ASSET_ACTIVATE, TX_VERSION_ASSET_SEND,
    TX_VERSION_ASSET_TRANSFER, TX_VERSION_ASSET_UPDATE,
};
use paydayd_consensus::Hash256;
use paydayd_primitives::Transaction;
use paydayd_storage::{Column, KeyValueStore, StoreError, WriteBatch};

use crate::allocation::AllocationTuple;
use crate::asset::Asset;
use crate::payload::{AllocationPayload, MintPayload};

const ASSET_PREFIX: u8 = b'a';
const TUPLE_PREFIX: u8 = b't';
const INDEX_VALUE_LEN: usize = 36;

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum IndexKey {
    Asset(u32),
    Allocation(AllocationTuple),
}

impl IndexKey {
    pub fn guid(&self) -> u32 {
        match self {
            IndexKey::Asset(guid) => *guid,
            IndexKey::Allocation(tuple) => tuple.guid,
        }
    }

    pub fn prefix(&self) -> Vec<u8> {
        match self {
            IndexKey::Asset(guid) => {
                let mut key = vec![ASSET_PREFIX];
                key.extend_from_slice(&guid.to_be_bytes());
                key
            }
            IndexKey::Allocation(tuple) => {
                let mut key = vec![TUPLE_PREFIX];
                key.extend_from_slice(&tuple.guid.to_be_bytes());
                key.push(tuple.address.version);
                key.push(tuple.address.program.len() as u8);
                key.extend_from_slice(&tuple.address.program);
                key
            }
        }
    }

    fn entry_key(&self, txid: &Hash256) -> Vec<u8> {
        let mut key = self.prefix();
        key.extend_from_slice(txid);
        key
    }
}

/// Where an indexed transaction was confirmed; zero for zdag acceptances.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IndexEntry {
    pub txid: Hash256,
    pub height: u32,
    pub block_hash: Hash256,
}

impl IndexEntry {
    fn encode(&self) -> [u8; INDEX_VALUE_LEN] {
        let mut out = [0u8; INDEX_VALUE_LEN];
        out[0..4].copy_from_slice(&self.height.to_le_bytes());
        out[4..36].copy_from_slice(&self.block_hash);
        out
    }

    fn decode(txid: Hash256, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != INDEX_VALUE_LEN {
            return None;
        }
        Some(Self {
            txid,
            height: u32::from_le_bytes(bytes[0..4].try_into().ok()?),
            block_hash: bytes[4..36].try_into().ok()?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexRecord {
    pub key: IndexKey,
    pub entry: IndexEntry,
}

pub struct AssetIndex<S> {
    store: S,
}

impl<S> AssetIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: KeyValueStore> AssetIndex<S> {
    pub fn insert(&self, batch: &mut WriteBatch, record: &IndexRecord) {
        batch.put(
            Column::AssetIndex,
            record.key.entry_key(&record.entry.txid),
            record.entry.encode(),
        );
    }

    pub fn delete(&self, batch: &mut WriteBatch, key: &IndexKey, txid: &Hash256) {
        batch.delete(Column::AssetIndex, key.entry_key(txid));
    }

    pub fn entries(&self, key: &IndexKey) -> Result<Vec<IndexEntry>, StoreError> {
        let prefix = key.prefix();
        let mut entries = Vec::new();
        self.store
            .for_each_prefix(Column::AssetIndex, &prefix, &mut |raw_key, value| {
                let txid: Hash256 = raw_key
                    .get(prefix.len()..)
                    .and_then(|rest| rest.try_into().ok())
                    .ok_or_else(|| StoreError::corrupt("asset index key"))?;
                let entry = IndexEntry::decode(txid, value)
                    .ok_or_else(|| StoreError::corrupt("asset index"))?;
                entries.push(entry);
                Ok(())
            })?;
        Ok(entries)
    }
}

/// Every history key a ledger transaction touches. Connect and disconnect
/// both derive their keys here so the two paths cannot drift apart.
pub(crate) fn index_keys(tx: &Transaction) -> Vec<IndexKey> {
    let mut keys = Vec::new();
    match tx.version {
        TX_VERSION_ASSET_ACTIVATE | TX_VERSION_ASSET_UPDATE | TX_VERSION_ASSET_TRANSFER => {
            if let Some(asset) = Asset::from_tx(tx) {
                keys.push(IndexKey::Asset(asset.guid));
            }
        }
        TX_VERSION_ASSET_SEND
        | TX_VERSION_ALLOCATION_SEND
        | TX_VERSION_ALLOCATION_BURN
        | TX_VERSION_ALLOCATION_LOCK => {
            if let Some(payload) = AllocationPayload::from_tx(tx) {
                keys.push(IndexKey::Asset(payload.tuple.guid));
                keys.push(IndexKey::Allocation(payload.tuple.clone()));
                keys.extend(payload.receiver_tuples().map(IndexKey::Allocation));
            }
        }
        TX_VERSION_ALLOCATION_MINT => {
            if let Some(mint) = MintPayload::from_tx(tx) {
                keys.push(IndexKey::Asset(mint.tuple.guid));
                keys.push(IndexKey::Allocation(mint.tuple));
            }
        }
        _ => {}
    }
    keys.sort();
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use paydayd_primitives::WitnessAddress;

    #[test]
    fn tuple_prefix_is_length_delimited() {
        let short = IndexKey::Allocation(AllocationTuple::new(9, WitnessAddress::new(0, vec![1; 20])));
        let long = IndexKey::Allocation(AllocationTuple::new(9, WitnessAddress::new(0, vec![1; 32])));
        assert!(!long.prefix().starts_with(&short.prefix()));
        assert!(!IndexKey::Asset(9).prefix().starts_with(&short.prefix()));
    }
}
