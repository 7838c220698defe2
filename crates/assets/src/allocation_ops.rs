//! Allocation send, burn and lock, in both the block and the zdag mempool
//! paths.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use paydayd_consensus::constants::{
    MAX_RECEIVERS_PER_SEND, TX_VERSION_ALLOCATION_BURN, TX_VERSION_ALLOCATION_LOCK,
    TX_VERSION_ALLOCATION_SEND,
};
use paydayd_consensus::Amount;
use paydayd_log::Category;
use paydayd_primitives::OutPoint;
use paydayd_storage::KeyValueStore;

use crate::allocation::{AllocationTuple, AssetAllocation};
use crate::asset::Asset;
use crate::auth::{find_owner_signature, CoinView};
use crate::classify::op_name;
use crate::delta::{BlockDelta, LockChange};
use crate::engine::{AssetEngine, TxContext};
use crate::error::{ConsensusError, ErrorKind};
use crate::locked::reject_foreign_locks;
use crate::mode::ValidationMode;
use crate::payload::{AllocationPayload, BurnData};
use crate::zdag::OverlayGuard;

/// Result of a successful check, applied by the mode-specific commit.
struct AllocationOutcome {
    balance: Amount,
    locked_outpoint: OutPoint,
    credits: Vec<(AllocationTuple, Amount)>,
    locks: Vec<LockChange>,
}

fn check_payload(version: i32, payload: &AllocationPayload) -> Result<(), ConsensusError> {
    match version {
        TX_VERSION_ALLOCATION_SEND => {
            if payload.receivers.is_empty() {
                return Err(ConsensusError::invariant(1004, "No receivers in asset allocation send"));
            }
            if payload.receivers.len() > MAX_RECEIVERS_PER_SEND {
                return Err(ConsensusError::invariant(1005, "Too many receivers in one allocation send"));
            }
            if !payload.locked_outpoint.is_null() {
                return Err(ConsensusError::invariant(1004, "Cannot lock outpoint in a send"));
            }
        }
        TX_VERSION_ALLOCATION_BURN => {
            if !payload.locked_outpoint.is_null() {
                return Err(ConsensusError::invariant(1004, "Cannot lock outpoint in a burn"));
            }
        }
        TX_VERSION_ALLOCATION_LOCK => {
            if payload.locked_outpoint.is_null() {
                return Err(ConsensusError::invariant(1004, "Lock requires an outpoint"));
            }
        }
        _ => {
            return Err(ConsensusError::malformed(1009, "Unknown asset allocation operation"));
        }
    }
    Ok(())
}

fn insufficient(code: u16, balance: Amount, amount: Amount) -> ConsensusError {
    ConsensusError::new(
        ErrorKind::InsufficientBalance,
        code,
        format!("Sender balance is insufficient: {balance} < {amount}"),
    )
}

impl<S: KeyValueStore> AssetEngine<S> {
    /// Validates an allocation send, burn or lock. Block modes apply it to
    /// `delta`; mempool mode applies it to the zdag overlay.
    pub fn apply_asset_allocation(
        &self,
        ctx: &TxContext<'_>,
        coins: &dyn CoinView,
        delta: &mut BlockDelta,
    ) -> Result<(), ConsensusError> {
        let version = ctx.tx.version;
        let payload = AllocationPayload::from_tx(ctx.tx).ok_or_else(|| {
            ConsensusError::malformed(
                1001,
                "Cannot unserialize data inside of this transaction relating to an assetallocation",
            )
        })?;
        check_payload(version, &payload)?;

        let sender = payload.tuple.clone();
        let stored = delta
            .allocation(&self.stores, &sender)?
            .map(|allocation| allocation.clone())
            .ok_or_else(|| {
                ConsensusError::new(
                    ErrorKind::UnknownAllocation,
                    1010,
                    format!("Cannot find sender asset allocation {sender}"),
                )
            })?;
        let asset = delta.asset_snapshot(&self.stores, sender.guid)?.ok_or_else(|| {
            ConsensusError::new(
                ErrorKind::UnknownAsset,
                1011,
                format!("Failed to read from asset DB for {}", sender.guid),
            )
        })?;
        if version == TX_VERSION_ALLOCATION_SEND {
            let stores = &self.stores;
            reject_foreign_locks(ctx.tx, &stored.locked_outpoint, |outpoint| {
                delta.is_outpoint_locked(stores, outpoint)
            })?;
        }

        let mut guard = ctx.mode.touches_overlay().then(|| self.overlay.lock());
        let seeded = match guard.as_mut() {
            Some(guard) => guard.seed(&sender, stored.balance),
            None => false,
        };
        let checked = self.check_allocation(ctx, coins, &payload, &asset, &stored, guard.as_mut());
        let outcome = match checked {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return Ok(()),
            Err(err) => {
                if let (true, Some(guard)) = (seeded, guard.as_mut()) {
                    guard.remove_balance(&sender);
                }
                return Err(err);
            }
        };

        match (ctx.mode, guard.as_mut()) {
            (ValidationMode::Sanity, _) => Ok(()),
            (ValidationMode::Mempool, Some(guard)) => {
                let committed = self.commit_zdag(ctx, &sender, outcome, guard, delta);
                if committed.is_err() && seeded {
                    guard.remove_balance(&sender);
                }
                committed
            }
            _ => self.commit_block(ctx, stored, outcome, delta),
        }
    }

    /// Every rule of the operation. Returns `None` for a mempool re-check of
    /// a send the overlay already holds.
    fn check_allocation(
        &self,
        ctx: &TxContext<'_>,
        coins: &dyn CoinView,
        payload: &AllocationPayload,
        asset: &Asset,
        stored: &AssetAllocation,
        mut guard: Option<&mut OverlayGuard<'_>>,
    ) -> Result<Option<AllocationOutcome>, ConsensusError> {
        let sender = &payload.tuple;
        let block_effects = ctx.mode.applies_block_effects();
        let balance = guard
            .as_ref()
            .and_then(|guard| guard.balance(sender))
            .unwrap_or(stored.balance);
        let mut outcome = AllocationOutcome {
            balance,
            locked_outpoint: stored.locked_outpoint.clone(),
            credits: Vec::new(),
            locks: Vec::new(),
        };

        match ctx.tx.version {
            TX_VERSION_ALLOCATION_BURN => {
                let burn = BurnData::from_tx(ctx.tx)
                    .ok_or_else(|| ConsensusError::malformed(1001, "Cannot unserialize burn data"))?;
                if burn.address != sender.address || burn.guid != sender.guid {
                    return Err(ConsensusError::invariant(1010, "Burn does not match the sender allocation"));
                }
                if !find_owner_signature(coins, ctx.tx, &sender.address, None) {
                    return Err(ConsensusError::unauthorized(1015, "Cannot find owner signature in inputs"));
                }
                if asset.contract.is_empty() {
                    return Err(ConsensusError::invariant(1010, "Asset has no bridge contract"));
                }
                if burn.amount <= 0 || burn.amount > asset.total_supply {
                    return Err(ConsensusError::supply(2029, "Burn amount out of range"));
                }
                if balance < burn.amount {
                    return Err(insufficient(1016, balance, burn.amount));
                }
                outcome.balance = balance - burn.amount;
                if ctx.mode.touches_overlay() {
                    if let Some(guard) = guard.as_mut() {
                        guard.mark_conflict(sender, self.chain.now_ms());
                    }
                } else {
                    outcome
                        .credits
                        .push((AllocationTuple::burn_sink(sender.guid), burn.amount));
                }
            }
            TX_VERSION_ALLOCATION_LOCK => {
                if !find_owner_signature(coins, ctx.tx, &sender.address, None) {
                    return Err(ConsensusError::unauthorized(1015, "Cannot find owner signature in inputs"));
                }
                if block_effects {
                    if !stored.locked_outpoint.is_null()
                        && stored.locked_outpoint != payload.locked_outpoint
                    {
                        outcome.locks.push(LockChange::Unlock(stored.locked_outpoint.clone()));
                    }
                    outcome.locks.push(LockChange::Lock(payload.locked_outpoint.clone()));
                    outcome.locked_outpoint = payload.locked_outpoint.clone();
                }
            }
            _ => {
                if !find_owner_signature(
                    coins,
                    ctx.tx,
                    &sender.address,
                    Some(&stored.locked_outpoint),
                ) {
                    return Err(ConsensusError::unauthorized(
                        1015,
                        "Cannot find owner signature in inputs or locked outpoint not spent",
                    ));
                }
                if block_effects && !stored.locked_outpoint.is_null() {
                    outcome.locks.push(LockChange::Unlock(stored.locked_outpoint.clone()));
                    outcome.locked_outpoint = OutPoint::null();
                }
                if payload.receivers.iter().any(|(_, amount)| *amount <= 0) {
                    return Err(ConsensusError::invariant(1020, "Receiving amount must be positive"));
                }
                let total = payload
                    .total()
                    .ok_or_else(|| ConsensusError::invariant(1020, "Receiving amounts overflow"))?;
                if balance < total {
                    if let Some(guard) = guard.as_mut() {
                        guard.mark_conflict(sender, self.chain.now_ms());
                        if guard.has_arrival(sender, &ctx.txid) {
                            return Ok(None);
                        }
                    }
                    return Err(insufficient(1021, balance, total));
                }
                if payload
                    .receivers
                    .iter()
                    .any(|(address, _)| *address == sender.address)
                {
                    return Err(ConsensusError::invariant(
                        1022,
                        "Cannot send an asset allocation to yourself",
                    ));
                }
                outcome.balance = balance - total;
                outcome.credits = payload
                    .receiver_tuples()
                    .zip(payload.receivers.iter().map(|(_, amount)| *amount))
                    .collect();
            }
        }
        Ok(Some(outcome))
    }

    fn commit_zdag(
        &self,
        ctx: &TxContext<'_>,
        sender: &AllocationTuple,
        outcome: AllocationOutcome,
        guard: &mut OverlayGuard<'_>,
        delta: &mut BlockDelta,
    ) -> Result<(), ConsensusError> {
        let mut persisted = Vec::with_capacity(outcome.credits.len());
        for (tuple, amount) in outcome.credits {
            let balance = delta.allocation_snapshot(&self.stores, &tuple)?.balance;
            persisted.push((tuple, balance, amount));
        }
        if ctx.tx.version == TX_VERSION_ALLOCATION_SEND {
            self.write_zdag_index(ctx)?;
        }
        if ctx.tx.version != TX_VERSION_ALLOCATION_LOCK {
            guard.record_arrival(sender, ctx.txid, self.chain.now_ms());
        }
        for (tuple, balance, amount) in &persisted {
            guard.credit(tuple, *balance, *amount);
        }
        guard.set_balance(sender, outcome.balance);
        paydayd_log::log_category!(
            Category::Zdag,
            "accepted {} {} from {sender}, projected balance {}",
            op_name(ctx.tx.version),
            paydayd_primitives::hash_to_hex(&ctx.txid),
            outcome.balance
        );
        Ok(())
    }

    fn commit_block(
        &self,
        ctx: &TxContext<'_>,
        stored: AssetAllocation,
        outcome: AllocationOutcome,
        delta: &mut BlockDelta,
    ) -> Result<(), ConsensusError> {
        let mut credited: BTreeMap<AllocationTuple, AssetAllocation> = BTreeMap::new();
        for (tuple, amount) in &outcome.credits {
            let receiver = match credited.entry(tuple.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(delta.allocation_snapshot(&self.stores, tuple)?),
            };
            receiver.balance = receiver
                .balance
                .checked_add(*amount)
                .ok_or_else(|| ConsensusError::supply(2029, "Receiver balance out of range"))?;
        }

        let is_lock = ctx.tx.version == TX_VERSION_ALLOCATION_LOCK;
        if ctx.mode.applies_block_effects() && !is_lock {
            let median_time_ms = self.median_time_ms();
            let miner = ctx.mode.is_miner();
            self.overlay.reset_sender(
                &stored.tuple,
                &ctx.txid,
                miner,
                false,
                median_time_ms,
                self.mempool.as_ref(),
            );
            if ctx.tx.version == TX_VERSION_ALLOCATION_SEND {
                for tuple in credited.keys() {
                    self.overlay.reset_sender(
                        tuple,
                        &ctx.txid,
                        miner,
                        true,
                        median_time_ms,
                        self.mempool.as_ref(),
                    );
                }
            }
        }

        let mut sender = stored;
        sender.pending_sends.clear();
        sender.balance = outcome.balance;
        sender.locked_outpoint = outcome.locked_outpoint;
        if sender.is_null() {
            sender.set_null();
        }
        let sender_tuple = sender.tuple.clone();
        delta.set_allocation(sender);
        for receiver in credited.into_values() {
            delta.set_allocation(receiver);
        }
        for change in outcome.locks {
            delta.push_lock(change);
        }

        if ctx.mode.writes_state() {
            self.queue_index(ctx, delta);
            paydayd_log::log_category!(
                Category::Asset,
                "connected asset allocation {} from {sender_tuple} at height {}",
                op_name(ctx.tx.version),
                ctx.height
            );
        }
        Ok(())
    }
}
