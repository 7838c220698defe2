//! Persisted ledger stores and the single-batch flush of a block delta.

use std::sync::Arc;

use paydayd_bridge::{MintKeyStore, TxRootStore};
use paydayd_consensus::Hash256;
use paydayd_log::Category;
use paydayd_primitives::encoding::{self, Decodable, Decoder, Encodable, Encoder};
use paydayd_primitives::OutPoint;
use paydayd_storage::{Column, KeyValueStore, StoreError, WriteBatch};

use crate::allocation::{AllocationTuple, AssetAllocation};
use crate::asset::Asset;
use crate::delta::{BlockDelta, LockChange};
use crate::index::{AssetIndex, IndexEntry, IndexKey, IndexRecord};
use crate::zdag::SavedSender;

const OVERLAY_KEY: &[u8] = b"zdag_overlay";

fn asset_key(guid: u32) -> [u8; 4] {
    guid.to_be_bytes()
}

fn outpoint_key(outpoint: &OutPoint) -> Vec<u8> {
    encoding::encode(outpoint)
}

/// Handles to every ledger namespace of one key-value store.
pub struct LedgerStores<S> {
    store: Arc<S>,
    roots: TxRootStore<Arc<S>>,
    mints: MintKeyStore<Arc<S>>,
    index: AssetIndex<Arc<S>>,
}

impl<S: KeyValueStore> LedgerStores<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            roots: TxRootStore::new(Arc::clone(&store)),
            mints: MintKeyStore::new(Arc::clone(&store)),
            index: AssetIndex::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn roots(&self) -> &TxRootStore<Arc<S>> {
        &self.roots
    }

    pub fn mints(&self) -> &MintKeyStore<Arc<S>> {
        &self.mints
    }

    pub fn get_asset(&self, guid: u32) -> Result<Option<Asset>, StoreError> {
        let bytes = match self.store.get(Column::Asset, &asset_key(guid))? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        Asset::from_bytes(&bytes)
            .map_err(|_| StoreError::corrupt("asset"))
            .map(Some)
    }

    /// Null records read back as absent.
    pub fn get_allocation(
        &self,
        tuple: &AllocationTuple,
    ) -> Result<Option<AssetAllocation>, StoreError> {
        let bytes = match self.store.get(Column::AssetAllocation, &tuple.key())? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let allocation =
            AssetAllocation::from_bytes(&bytes).map_err(|_| StoreError::corrupt("allocation"))?;
        Ok((!allocation.is_null()).then_some(allocation))
    }

    /// Non-null allocations of one asset, in tuple key order.
    pub fn allocations_of(&self, guid: u32) -> Result<Vec<AssetAllocation>, StoreError> {
        let mut allocations = Vec::new();
        self.store
            .for_each_prefix(Column::AssetAllocation, &guid.to_be_bytes(), &mut |_, value| {
                let allocation = AssetAllocation::from_bytes(value)
                    .map_err(|_| StoreError::corrupt("allocation"))?;
                if !allocation.is_null() {
                    allocations.push(allocation);
                }
                Ok(())
            })?;
        Ok(allocations)
    }

    pub fn all_assets(&self) -> Result<Vec<Asset>, StoreError> {
        let mut assets = Vec::new();
        self.store
            .for_each_prefix(Column::Asset, &[], &mut |_, value| {
                assets.push(Asset::from_bytes(value).map_err(|_| StoreError::corrupt("asset"))?);
                Ok(())
            })?;
        Ok(assets)
    }

    /// Hash of the block that confirmed `txid`.
    pub fn block_of(&self, txid: &Hash256) -> Result<Option<Hash256>, StoreError> {
        let bytes = match self.store.get(Column::BlockIndex, txid)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let hash: Hash256 = bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::corrupt("block index"))?;
        Ok(Some(hash))
    }

    pub fn is_outpoint_locked(&self, outpoint: &OutPoint) -> Result<bool, StoreError> {
        Ok(self
            .store
            .get(Column::LockedOutpoint, &outpoint_key(outpoint))?
            .is_some())
    }

    pub fn index_entries(&self, key: &IndexKey) -> Result<Vec<IndexEntry>, StoreError> {
        self.index.entries(key)
    }

    /// Writes zdag history entries outside of a block flush.
    pub fn write_index_now(&self, records: &[IndexRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        for record in records {
            self.index.insert(&mut batch, record);
        }
        self.store.write_batch(&batch)
    }

    /// Applies every change of `delta` as one atomic batch.
    pub fn flush(&self, delta: &BlockDelta) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        for (guid, asset) in delta.assets() {
            if asset.is_null() {
                batch.delete(Column::Asset, asset_key(guid));
            } else {
                batch.put(Column::Asset, asset_key(guid), asset.to_bytes());
            }
        }
        for allocation in delta.allocations() {
            batch.put(
                Column::AssetAllocation,
                allocation.tuple.key(),
                allocation.to_bytes(),
            );
        }
        for change in delta.locks() {
            match change {
                LockChange::Lock(outpoint) => {
                    batch.put(Column::LockedOutpoint, outpoint_key(outpoint), [1u8]);
                }
                LockChange::Unlock(outpoint) => {
                    batch.delete(Column::LockedOutpoint, outpoint_key(outpoint));
                }
            }
        }
        for key in &delta.mint_writes {
            self.mints.insert(&mut batch, key);
        }
        for key in &delta.mint_erases {
            self.mints.delete(&mut batch, key);
        }
        for (txid, block_hash) in &delta.block_index {
            batch.put(Column::BlockIndex, *txid, *block_hash);
        }
        for txid in &delta.block_index_erases {
            batch.delete(Column::BlockIndex, *txid);
        }
        for record in &delta.index_writes {
            self.index.insert(&mut batch, record);
        }
        for (key, txid) in &delta.index_erases {
            self.index.delete(&mut batch, key, txid);
        }

        if batch.is_empty() {
            return Ok(());
        }
        let counts = batch.column_counts();
        self.store.write_batch(&batch)?;
        let summary = Column::ALL
            .iter()
            .zip(counts.iter())
            .filter(|(_, count)| **count > 0)
            .map(|(column, count)| format!("{}={count}", column.as_str()))
            .collect::<Vec<_>>()
            .join(" ");
        paydayd_log::log_category!(
            Category::Store,
            "flushed {} ledger writes: {summary}",
            batch.len()
        );
        Ok(())
    }

    /// Erases allocation records whose balance reached zero. Returns the
    /// number of records removed.
    pub fn prune_null_allocations(&self) -> Result<usize, StoreError> {
        let mut batch = WriteBatch::new();
        self.store
            .for_each_prefix(Column::AssetAllocation, &[], &mut |key, value| {
                let allocation = AssetAllocation::from_bytes(value)
                    .map_err(|_| StoreError::corrupt("allocation"))?;
                if allocation.is_null() {
                    batch.delete(Column::AssetAllocation, key);
                }
                Ok(())
            })?;
        let removed = batch.len();
        if removed > 0 {
            self.store.write_batch(&batch)?;
            paydayd_log::log_category!(
                Category::Store,
                "pruned {removed} empty asset allocations"
            );
        }
        Ok(removed)
    }

    /// Persists the zdag overlay across restarts.
    pub fn save_overlay(&self, senders: &[SavedSender]) -> Result<(), StoreError> {
        let mut encoder = Encoder::new();
        encoder.write_varint(senders.len() as u64);
        for sender in senders {
            sender.tuple.consensus_encode(&mut encoder);
            encoder.write_i64_le(sender.balance);
            encoder.write_varint(sender.arrivals.len() as u64);
            for (txid, arrival) in &sender.arrivals {
                encoder.write_hash_le(txid);
                encoder.write_i64_le(*arrival);
            }
        }
        self.store
            .put(Column::Meta, OVERLAY_KEY, &encoder.into_inner())
    }

    /// Reads and clears the saved overlay.
    pub fn load_overlay(&self) -> Result<Vec<SavedSender>, StoreError> {
        let senders = self.read_overlay()?;
        self.store.delete(Column::Meta, OVERLAY_KEY)?;
        Ok(senders)
    }

    /// Reads the saved overlay and leaves it in place.
    pub fn read_overlay(&self) -> Result<Vec<SavedSender>, StoreError> {
        let bytes = match self.store.get(Column::Meta, OVERLAY_KEY)? {
            Some(bytes) => bytes,
            None => return Ok(Vec::new()),
        };
        let corrupt = |_| StoreError::corrupt("zdag overlay");
        let mut decoder = Decoder::new(&bytes);
        let count = decoder.read_varint().map_err(corrupt)?;
        let mut senders = Vec::new();
        for _ in 0..count {
            let tuple = AllocationTuple::consensus_decode(&mut decoder).map_err(corrupt)?;
            let balance = decoder.read_i64_le().map_err(corrupt)?;
            let arrival_count = decoder.read_varint().map_err(corrupt)?;
            let mut arrivals = Vec::new();
            for _ in 0..arrival_count {
                let txid = decoder.read_hash_le().map_err(corrupt)?;
                let arrival = decoder.read_i64_le().map_err(corrupt)?;
                arrivals.push((txid, arrival));
            }
            senders.push(SavedSender {
                tuple,
                balance,
                arrivals,
            });
        }
        Ok(senders)
    }
}
