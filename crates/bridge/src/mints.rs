//! Replay protection for bridge mints, keyed by external (height, tx path).

use paydayd_storage::{Column, KeyValueStore, StoreError, WriteBatch};

const MINT_KEY_LEN: usize = 12;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MintKey {
    pub block_number: u64,
    pub tx_path: u32,
}

impl MintKey {
    pub fn new(block_number: u64, tx_path: u32) -> Self {
        Self {
            block_number,
            tx_path,
        }
    }

    pub fn encode(&self) -> [u8; MINT_KEY_LEN] {
        let mut out = [0u8; MINT_KEY_LEN];
        out[0..8].copy_from_slice(&self.block_number.to_be_bytes());
        out[8..12].copy_from_slice(&self.tx_path.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != MINT_KEY_LEN {
            return None;
        }
        let block_number = u64::from_be_bytes(bytes[0..8].try_into().ok()?);
        let tx_path = u32::from_be_bytes(bytes[8..12].try_into().ok()?);
        Some(Self::new(block_number, tx_path))
    }
}

pub struct MintKeyStore<S> {
    store: S,
}

impl<S> MintKeyStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: KeyValueStore> MintKeyStore<S> {
    pub fn contains(&self, key: &MintKey) -> Result<bool, StoreError> {
        Ok(self.store.get(Column::ExternalMint, &key.encode())?.is_some())
    }

    pub fn insert(&self, batch: &mut WriteBatch, key: &MintKey) {
        batch.put(Column::ExternalMint, key.encode(), [1u8]);
    }

    pub fn delete(&self, batch: &mut WriteBatch, key: &MintKey) {
        batch.delete(Column::ExternalMint, key.encode());
    }

    pub fn all(&self) -> Result<Vec<MintKey>, StoreError> {
        self.store
            .scan_prefix(Column::ExternalMint, &[])?
            .into_iter()
            .map(|(key, _)| MintKey::decode(&key).ok_or_else(|| StoreError::corrupt("mint key")))
            .collect()
    }
}
