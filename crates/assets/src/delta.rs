//! Per-block accumulator of ledger changes. Later transactions of a block
//! read through it before falling back to the persisted store, and the
//! driver flushes it once after the whole block validated.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use paydayd_bridge::MintKey;
use paydayd_consensus::Hash256;
use paydayd_primitives::OutPoint;
use paydayd_storage::{KeyValueStore, StoreError};

use crate::allocation::{AllocationTuple, AssetAllocation};
use crate::asset::Asset;
use crate::db::LedgerStores;
use crate::index::{IndexKey, IndexRecord};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LockChange {
    Lock(OutPoint),
    Unlock(OutPoint),
}

#[derive(Clone, Debug, Default)]
pub struct BlockDelta {
    /// Records read so far, with this block's changes applied. Null assets
    /// mark erasures.
    assets: BTreeMap<u32, Asset>,
    allocations: BTreeMap<AllocationTuple, AssetAllocation>,
    /// Records changed by the block; only these are flushed.
    dirty_assets: BTreeSet<u32>,
    dirty_allocations: BTreeSet<AllocationTuple>,
    pub(crate) locks: Vec<LockChange>,
    pub(crate) mint_writes: Vec<MintKey>,
    pub(crate) mint_erases: Vec<MintKey>,
    pub(crate) block_index: Vec<(Hash256, Hash256)>,
    pub(crate) block_index_erases: Vec<Hash256>,
    pub(crate) index_writes: Vec<IndexRecord>,
    pub(crate) index_erases: Vec<(IndexKey, Hash256)>,
}

impl BlockDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// The asset as seen by the next transaction of the block, loading it
    /// into the delta on first use.
    pub fn asset<S: KeyValueStore>(
        &mut self,
        stores: &LedgerStores<S>,
        guid: u32,
    ) -> Result<Option<&mut Asset>, StoreError> {
        let asset = match self.assets.entry(guid) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(stores.get_asset(guid)?.unwrap_or_default()),
        };
        Ok((!asset.is_null()).then_some(asset))
    }

    pub fn asset_snapshot<S: KeyValueStore>(
        &mut self,
        stores: &LedgerStores<S>,
        guid: u32,
    ) -> Result<Option<Asset>, StoreError> {
        Ok(self.asset(stores, guid)?.map(|asset| asset.clone()))
    }

    /// Replaces the asset stored under `guid`; a null asset erases it.
    pub fn set_asset(&mut self, guid: u32, asset: Asset) {
        self.dirty_assets.insert(guid);
        self.assets.insert(guid, asset);
    }

    /// The allocation of `tuple`, or `None` when it is absent or null.
    pub fn allocation<S: KeyValueStore>(
        &mut self,
        stores: &LedgerStores<S>,
        tuple: &AllocationTuple,
    ) -> Result<Option<&mut AssetAllocation>, StoreError> {
        let allocation = self.allocation_or_default(stores, tuple)?;
        Ok((!allocation.is_null()).then_some(allocation))
    }

    /// The allocation of `tuple`, materializing an empty record when the
    /// tuple has never held a balance.
    pub fn allocation_or_default<S: KeyValueStore>(
        &mut self,
        stores: &LedgerStores<S>,
        tuple: &AllocationTuple,
    ) -> Result<&mut AssetAllocation, StoreError> {
        let allocation = match self.allocations.entry(tuple.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let loaded = stores
                    .get_allocation(tuple)?
                    .unwrap_or_else(|| AssetAllocation::new(tuple.clone()));
                entry.insert(loaded)
            }
        };
        Ok(allocation)
    }

    pub fn allocation_snapshot<S: KeyValueStore>(
        &mut self,
        stores: &LedgerStores<S>,
        tuple: &AllocationTuple,
    ) -> Result<AssetAllocation, StoreError> {
        Ok(self.allocation_or_default(stores, tuple)?.clone())
    }

    pub fn set_allocation(&mut self, allocation: AssetAllocation) {
        self.dirty_allocations.insert(allocation.tuple.clone());
        self.allocations.insert(allocation.tuple.clone(), allocation);
    }

    pub fn push_lock(&mut self, change: LockChange) {
        self.locks.push(change);
    }

    /// Lock state of `outpoint` with this block's lock changes applied.
    pub fn is_outpoint_locked<S: KeyValueStore>(
        &self,
        stores: &LedgerStores<S>,
        outpoint: &OutPoint,
    ) -> Result<bool, StoreError> {
        let latest = self.locks.iter().rev().find_map(|change| match change {
            LockChange::Lock(locked) if locked == outpoint => Some(true),
            LockChange::Unlock(unlocked) if unlocked == outpoint => Some(false),
            _ => None,
        });
        match latest {
            Some(locked) => Ok(locked),
            None => stores.is_outpoint_locked(outpoint),
        }
    }

    pub fn has_pending_mint(&self, key: &MintKey) -> bool {
        self.mint_writes.contains(key)
    }

    pub fn push_mint(&mut self, key: MintKey) {
        self.mint_writes.push(key);
    }

    pub fn erase_mint(&mut self, key: MintKey) {
        self.mint_erases.push(key);
    }

    pub fn record_block_tx(&mut self, txid: Hash256, block_hash: Hash256) {
        self.block_index.push((txid, block_hash));
    }

    pub fn erase_block_tx(&mut self, txid: Hash256) {
        self.block_index_erases.push(txid);
    }

    pub fn push_index(&mut self, record: IndexRecord) {
        self.index_writes.push(record);
    }

    pub fn erase_index(&mut self, key: IndexKey, txid: Hash256) {
        self.index_erases.push((key, txid));
    }

    /// Changed assets keyed by GUID.
    pub fn assets(&self) -> impl Iterator<Item = (u32, &Asset)> + '_ {
        self.dirty_assets
            .iter()
            .filter_map(|guid| self.assets.get(guid).map(|asset| (*guid, asset)))
    }

    pub fn allocations(&self) -> impl Iterator<Item = &AssetAllocation> + '_ {
        self.dirty_allocations
            .iter()
            .filter_map(|tuple| self.allocations.get(tuple))
    }

    pub fn locks(&self) -> &[LockChange] {
        &self.locks
    }

    pub fn mint_writes(&self) -> &[MintKey] {
        &self.mint_writes
    }

    pub fn is_empty(&self) -> bool {
        self.dirty_assets.is_empty()
            && self.dirty_allocations.is_empty()
            && self.locks.is_empty()
            && self.mint_writes.is_empty()
            && self.mint_erases.is_empty()
            && self.block_index.is_empty()
            && self.block_index_erases.is_empty()
            && self.index_writes.is_empty()
            && self.index_erases.is_empty()
    }
}
