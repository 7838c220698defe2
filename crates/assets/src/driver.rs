//! Per-block and per-mempool-transaction driver around [`AssetEngine`].
//!
//! A block is validated against one [`BlockDelta`]; only a connected block
//! flushes it, as one batch, after every transaction passed.

use std::sync::{Mutex, MutexGuard};

use rayon::prelude::*;

use paydayd_consensus::Hash256;
use paydayd_primitives::{hash_to_hex, Transaction};
use paydayd_storage::KeyValueStore;

use crate::auth::CoinView;
use crate::classify::is_ledger_tx;
use crate::delta::BlockDelta;
use crate::engine::{AssetEngine, TxContext};
use crate::error::DriverError;
use crate::mode::ValidationMode;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockMode {
    /// Extends the active chain and persists the result.
    Connect,
    /// Validates without persisting anything.
    Check,
    /// Block template assembly; failing transactions are excluded.
    Miner,
}

impl BlockMode {
    pub fn validation_mode(self) -> ValidationMode {
        match self {
            BlockMode::Connect => ValidationMode::Connect,
            BlockMode::Check => ValidationMode::BlockCheck,
            BlockMode::Miner => ValidationMode::Miner,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LedgerBlock<'a> {
    pub hash: Hash256,
    pub height: u32,
    pub transactions: &'a [Transaction],
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BlockOutcome {
    /// Ledger transactions that validated.
    pub applied: usize,
    /// Miner mode only: transactions to leave out of the template.
    pub txs_to_remove: Vec<Hash256>,
}

pub struct LedgerDriver<S> {
    validation: Mutex<()>,
    engine: AssetEngine<S>,
}

impl<S: KeyValueStore> LedgerDriver<S> {
    pub fn new(engine: AssetEngine<S>) -> Self {
        Self {
            validation: Mutex::new(()),
            engine,
        }
    }

    pub fn engine(&self) -> &AssetEngine<S> {
        &self.engine
    }

    fn lock_validation(&self) -> MutexGuard<'_, ()> {
        match self.validation.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Mempool acceptance of one transaction. `sanity` runs every check
    /// without touching the zdag overlay.
    pub fn check_transaction(
        &self,
        tx: &Transaction,
        coins: &dyn CoinView,
        sanity: bool,
    ) -> Result<(), DriverError> {
        let _validation = self.lock_validation();
        if tx.is_coinbase() {
            return Ok(());
        }
        self.engine
            .check_locked_outpoints(tx)
            .map_err(DriverError::from_consensus)?;
        if !is_ledger_tx(tx.version) {
            return Ok(());
        }

        let mode = if sanity {
            ValidationMode::Sanity
        } else {
            ValidationMode::Mempool
        };
        let height = self.engine.chain().height().saturating_add(1);
        let ctx = TxContext::new(tx, height, [0u8; 32], mode);
        let mut scratch = BlockDelta::new();
        self.engine
            .apply(&ctx, coins, &mut scratch)
            .map_err(DriverError::from_consensus)
    }

    /// Validates every ledger transaction of `block` in order. Connect mode
    /// persists the block's changes; miner mode collects failing
    /// transactions instead of failing the block.
    pub fn connect_block(
        &self,
        block: &LedgerBlock<'_>,
        coins: &dyn CoinView,
        mode: BlockMode,
    ) -> Result<BlockOutcome, DriverError> {
        let _validation = self.lock_validation();
        let validation_mode = mode.validation_mode();
        let txids: Vec<Hash256> = block.transactions.par_iter().map(|tx| tx.txid()).collect();

        let mut delta = BlockDelta::new();
        let mut outcome = BlockOutcome::default();
        for (tx, txid) in block.transactions.iter().zip(txids.iter()) {
            if validation_mode.writes_state() {
                delta.record_block_tx(*txid, block.hash);
            }
            if tx.is_coinbase() || !is_ledger_tx(tx.version) {
                continue;
            }
            let ctx = TxContext::with_txid(tx, *txid, block.height, block.hash, validation_mode);
            match self.engine.apply(&ctx, coins, &mut delta) {
                Ok(()) => outcome.applied += 1,
                Err(error) if mode == BlockMode::Miner && !error.kind.is_fatal() => {
                    paydayd_log::log_debug!(
                        "excluding {} from block template: {error}",
                        hash_to_hex(txid)
                    );
                    outcome.txs_to_remove.push(*txid);
                }
                Err(error) => {
                    paydayd_log::log_warn!(
                        "block {} at height {} rejected by {}: {error}",
                        hash_to_hex(&block.hash),
                        block.height,
                        hash_to_hex(txid)
                    );
                    return Err(DriverError::from_consensus(error));
                }
            }
        }

        if validation_mode.writes_state() {
            self.engine.stores().flush(&delta)?;
            paydayd_log::log_debug!(
                "connected {} ledger transactions of block {} at height {}",
                outcome.applied,
                hash_to_hex(&block.hash),
                block.height
            );
        }
        Ok(outcome)
    }

    /// Rolls back `block` in reverse transaction order and persists the
    /// result. Any failure means the ledger no longer matches the chain.
    pub fn disconnect_block(&self, block: &LedgerBlock<'_>) -> Result<(), DriverError> {
        let _validation = self.lock_validation();
        let txids: Vec<Hash256> = block.transactions.par_iter().map(|tx| tx.txid()).collect();

        let mut delta = BlockDelta::new();
        for (tx, txid) in block.transactions.iter().zip(txids.iter()).rev() {
            delta.erase_block_tx(*txid);
            if tx.is_coinbase() || !is_ledger_tx(tx.version) {
                continue;
            }
            let ctx = TxContext::with_txid(
                tx,
                *txid,
                block.height,
                block.hash,
                ValidationMode::Connect,
            );
            self.engine
                .disconnect(&ctx, &mut delta)
                .map_err(DriverError::Fatal)?;
        }

        self.engine.stores().flush(&delta)?;
        self.engine.resync_overlay();
        paydayd_log::log_debug!(
            "disconnected block {} at height {}",
            hash_to_hex(&block.hash),
            block.height
        );
        Ok(())
    }
}
