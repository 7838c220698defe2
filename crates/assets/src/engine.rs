//! Entry points of the asset ledger. The per-operation rules live in the
//! private `asset_ops`, `allocation_ops`, `mint`, `disconnect` and `locked`
//! modules, each adding methods to [`AssetEngine`].

use std::sync::Arc;

use paydayd_bridge::{KeccakTrieVerifier, ProofVerifier, SyncCursor};
use paydayd_consensus::{Amount, ConsensusParams, Hash256};
use paydayd_log::Category;
use paydayd_primitives::Transaction;
use paydayd_storage::{KeyValueStore, StoreError};

use crate::allocation::{AllocationTuple, AssetAllocation};
use crate::asset::Asset;
use crate::auth::CoinView;
use crate::classify::{classify, OpClass};
use crate::config::{AssetConfig, BridgeSettings};
use crate::context::{ChainContext, MempoolView};
use crate::db::LedgerStores;
use crate::delta::BlockDelta;
use crate::error::ConsensusError;
use crate::index::{index_keys, IndexEntry, IndexRecord};
use crate::mode::ValidationMode;
use crate::zdag::{ZdagOverlay, ZdagStatus};

/// One transaction being validated, with where it is being validated.
#[derive(Clone, Copy, Debug)]
pub struct TxContext<'a> {
    pub tx: &'a Transaction,
    pub txid: Hash256,
    /// Height of the block the transaction is (or would be) included in.
    pub height: u32,
    /// Zero outside of block paths.
    pub block_hash: Hash256,
    pub mode: ValidationMode,
}

impl<'a> TxContext<'a> {
    pub fn new(tx: &'a Transaction, height: u32, block_hash: Hash256, mode: ValidationMode) -> Self {
        Self::with_txid(tx, tx.txid(), height, block_hash, mode)
    }

    pub fn with_txid(
        tx: &'a Transaction,
        txid: Hash256,
        height: u32,
        block_hash: Hash256,
        mode: ValidationMode,
    ) -> Self {
        Self {
            tx,
            txid,
            height,
            block_hash,
            mode,
        }
    }
}

pub struct AssetEngine<S> {
    pub(crate) stores: LedgerStores<S>,
    pub(crate) params: ConsensusParams,
    pub(crate) config: AssetConfig,
    pub(crate) bridge: BridgeSettings,
    pub(crate) cursor: Arc<SyncCursor>,
    pub(crate) overlay: ZdagOverlay,
    pub(crate) verifier: Box<dyn ProofVerifier>,
    pub(crate) chain: Arc<dyn ChainContext>,
    pub(crate) mempool: Arc<dyn MempoolView>,
}

impl<S: KeyValueStore> AssetEngine<S> {
    pub fn new(
        store: Arc<S>,
        params: ConsensusParams,
        config: AssetConfig,
        chain: Arc<dyn ChainContext>,
        mempool: Arc<dyn MempoolView>,
    ) -> Self {
        Self {
            stores: LedgerStores::new(store),
            params,
            overlay: ZdagOverlay::new(config.zdag),
            config,
            bridge: BridgeSettings::default(),
            cursor: Arc::new(SyncCursor::new()),
            verifier: Box::new(KeccakTrieVerifier),
            chain,
            mempool,
        }
    }

    pub fn with_verifier(mut self, verifier: Box<dyn ProofVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_bridge_settings(mut self, bridge: BridgeSettings) -> Self {
        self.bridge = bridge;
        self
    }

    /// Shares the external sync cursor with whatever ingests external roots.
    pub fn with_cursor(mut self, cursor: Arc<SyncCursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn stores(&self) -> &LedgerStores<S> {
        &self.stores
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    pub fn cursor(&self) -> &Arc<SyncCursor> {
        &self.cursor
    }

    pub fn overlay(&self) -> &ZdagOverlay {
        &self.overlay
    }

    pub fn chain(&self) -> &Arc<dyn ChainContext> {
        &self.chain
    }

    /// Validates and applies one ledger transaction of any family.
    /// Transactions outside the ledger pass untouched.
    pub fn apply(
        &self,
        ctx: &TxContext<'_>,
        coins: &dyn CoinView,
        delta: &mut BlockDelta,
    ) -> Result<(), ConsensusError> {
        match classify(ctx.tx.version) {
            OpClass::Asset => self.apply_asset(ctx, coins, delta),
            OpClass::Allocation => self.apply_asset_allocation(ctx, coins, delta),
            OpClass::Mint => self.apply_mint(ctx, delta),
            OpClass::None => Ok(()),
        }
    }

    /// Reverses one ledger transaction of any family.
    pub fn disconnect(&self, ctx: &TxContext<'_>, delta: &mut BlockDelta) -> Result<(), ConsensusError> {
        match classify(ctx.tx.version) {
            OpClass::Asset => self.disconnect_asset(ctx, delta),
            OpClass::Allocation => self.disconnect_asset_allocation(ctx, delta),
            OpClass::Mint => self.disconnect_mint(ctx, delta),
            OpClass::None => Ok(()),
        }
    }

    pub fn get_asset(&self, guid: u32) -> Result<Option<Asset>, StoreError> {
        self.stores.get_asset(guid)
    }

    pub fn get_asset_allocation(
        &self,
        tuple: &AllocationTuple,
    ) -> Result<Option<AssetAllocation>, StoreError> {
        self.stores.get_allocation(tuple)
    }

    pub fn tx_status(&self, sender: &AllocationTuple, txid: &Hash256) -> ZdagStatus {
        self.overlay.tx_status(sender, txid, self.chain.now_ms())
    }

    pub fn sender_status(&self, sender: &AllocationTuple) -> ZdagStatus {
        self.overlay.sender_status(sender, self.chain.now_ms())
    }

    /// Projected balance of `tuple` including unconfirmed zdag sends.
    pub fn zdag_balance(&self, tuple: &AllocationTuple) -> Result<Amount, StoreError> {
        if let Some(balance) = self.overlay.balance(tuple) {
            return Ok(balance);
        }
        Ok(self
            .stores
            .get_allocation(tuple)?
            .map(|allocation| allocation.balance)
            .unwrap_or(0))
    }

    /// Drops overlay state the mempool no longer backs.
    pub fn resync_overlay(&self) -> usize {
        self.overlay
            .resync(self.mempool.as_ref(), self.median_time_ms())
    }

    pub fn save_overlay(&self) -> Result<(), StoreError> {
        let senders = self.overlay.snapshot();
        self.stores.save_overlay(&senders)?;
        paydayd_log::log_category!(
            Category::Zdag,
            "saved zdag state of {} senders",
            senders.len()
        );
        Ok(())
    }

    /// Restores the saved overlay, then resyncs it against the mempool.
    /// Returns the number of senders kept.
    pub fn restore_overlay(&self) -> Result<usize, StoreError> {
        let senders = self.stores.load_overlay()?;
        let loaded = senders.len();
        self.overlay.restore(senders);
        let dropped = self.resync_overlay();
        paydayd_log::log_category!(
            Category::Zdag,
            "restored zdag state of {loaded} senders, {dropped} dropped by resync"
        );
        Ok(loaded.saturating_sub(dropped))
    }

    pub(crate) fn median_time_ms(&self) -> i64 {
        self.chain.median_time_past().saturating_mul(1000)
    }

    /// Queues history entries of a connected transaction.
    pub(crate) fn queue_index(&self, ctx: &TxContext<'_>, delta: &mut BlockDelta) {
        if !self.config.asset_index {
            return;
        }
        for key in index_keys(ctx.tx) {
            if self.config.indexes(key.guid()) {
                delta.push_index(IndexRecord {
                    key,
                    entry: IndexEntry {
                        txid: ctx.txid,
                        height: ctx.height,
                        block_hash: ctx.block_hash,
                    },
                });
            }
        }
    }

    /// Writes history entries of an accepted zdag transaction right away.
    pub(crate) fn write_zdag_index(&self, ctx: &TxContext<'_>) -> Result<(), StoreError> {
        if !self.config.asset_index {
            return Ok(());
        }
        let records: Vec<IndexRecord> = index_keys(ctx.tx)
            .into_iter()
            .filter(|key| self.config.indexes(key.guid()))
            .map(|key| IndexRecord {
                key,
                entry: IndexEntry {
                    txid: ctx.txid,
                    height: ctx.height,
                    block_hash: ctx.block_hash,
                },
            })
            .collect();
        self.stores.write_index_now(&records)
    }

    pub(crate) fn erase_index(&self, ctx: &TxContext<'_>, delta: &mut BlockDelta) {
        if !self.config.asset_index {
            return;
        }
        for key in index_keys(ctx.tx) {
            if self.config.indexes(key.guid()) {
                delta.erase_index(key, ctx.txid);
            }
        }
    }
}
