//! Rollback of connected ledger transactions, applied in reverse block order.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use paydayd_bridge::rlp;
use paydayd_bridge::MintKey;
use paydayd_consensus::constants::{
    TX_VERSION_ALLOCATION_BURN, TX_VERSION_ALLOCATION_LOCK, TX_VERSION_ALLOCATION_MINT,
    TX_VERSION_ASSET_ACTIVATE, TX_VERSION_ASSET_SEND, TX_VERSION_ASSET_TRANSFER,
    TX_VERSION_ASSET_UPDATE,
};
use paydayd_consensus::Amount;
use paydayd_log::Category;
use paydayd_primitives::OutPoint;
use paydayd_storage::KeyValueStore;

use crate::allocation::{AllocationTuple, AssetAllocation};
use crate::asset::Asset;
use crate::classify::op_name;
use crate::delta::{BlockDelta, LockChange};
use crate::engine::{AssetEngine, TxContext};
use crate::error::ConsensusError;
use crate::payload::{AllocationPayload, BurnData, MintPayload};

fn inconsistent(ctx: &TxContext<'_>, message: impl Into<String>) -> ConsensusError {
    let message = message.into();
    paydayd_log::log_error!(
        "ledger rollback of {} failed: {message}",
        paydayd_primitives::hash_to_hex(&ctx.txid)
    );
    ConsensusError::inconsistent(message)
}

/// Debits every receiver of a send, collecting the rewound records so
/// nothing is written unless all of them stay non-negative.
fn rewind_receivers<S: KeyValueStore>(
    engine: &AssetEngine<S>,
    ctx: &TxContext<'_>,
    credits: &[(AllocationTuple, Amount)],
    delta: &mut BlockDelta,
) -> Result<Vec<AssetAllocation>, ConsensusError> {
    let mut rewound: BTreeMap<AllocationTuple, AssetAllocation> = BTreeMap::new();
    for (tuple, amount) in credits {
        let receiver = match rewound.entry(tuple.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(delta.allocation_snapshot(&engine.stores, tuple)?),
        };
        receiver.balance -= amount;
        if receiver.balance < 0 {
            return Err(inconsistent(
                ctx,
                format!("receiver {tuple} balance went negative"),
            ));
        }
        if receiver.balance == 0 {
            receiver.set_null();
        }
    }
    Ok(rewound.into_values().collect())
}

fn payload_credits(payload: &AllocationPayload) -> Vec<(AllocationTuple, Amount)> {
    payload
        .receiver_tuples()
        .zip(payload.receivers.iter().map(|(_, amount)| *amount))
        .collect()
}

impl<S: KeyValueStore> AssetEngine<S> {
    /// Reverses an asset activation, update, transfer or issuer send.
    pub fn disconnect_asset(&self, ctx: &TxContext<'_>, delta: &mut BlockDelta) -> Result<(), ConsensusError> {
        let version = ctx.tx.version;
        if version == TX_VERSION_ASSET_SEND {
            let payload = AllocationPayload::from_tx(ctx.tx)
                .ok_or_else(|| inconsistent(ctx, "cannot decode asset send"))?;
            let guid = payload.tuple.guid;
            let mut asset = self.rollback_asset(ctx, delta, guid)?;
            let credits = payload_credits(&payload);
            let receivers = rewind_receivers(self, ctx, &credits, delta)?;
            for (_, amount) in &credits {
                asset.balance += amount;
            }
            for receiver in receivers {
                delta.set_allocation(receiver);
            }
            delta.set_asset(guid, asset);
        } else {
            let record = Asset::from_tx(ctx.tx)
                .ok_or_else(|| inconsistent(ctx, "cannot decode asset"))?;
            let guid = record.guid;
            match version {
                TX_VERSION_ASSET_ACTIVATE => {
                    delta.set_asset(guid, Asset::default());
                }
                TX_VERSION_ASSET_UPDATE => {
                    let mut asset = self.rollback_asset(ctx, delta, guid)?;
                    if record.balance > 0 {
                        asset.balance -= record.balance;
                        asset.total_supply -= record.balance;
                        if asset.balance < 0 || asset.total_supply < 0 {
                            return Err(inconsistent(
                                ctx,
                                format!("asset {guid} supply went negative"),
                            ));
                        }
                    }
                    delta.set_asset(guid, asset);
                }
                TX_VERSION_ASSET_TRANSFER => {
                    let mut asset = self.rollback_asset(ctx, delta, guid)?;
                    asset.owner = record.owner;
                    delta.set_asset(guid, asset);
                }
                _ => return Err(inconsistent(ctx, "unknown asset operation")),
            }
        }

        self.erase_index(ctx, delta);
        paydayd_log::log_category!(
            Category::Asset,
            "disconnected {} at height {}",
            op_name(version),
            ctx.height
        );
        Ok(())
    }

    /// Reverses an allocation send, burn or lock.
    pub fn disconnect_asset_allocation(
        &self,
        ctx: &TxContext<'_>,
        delta: &mut BlockDelta,
    ) -> Result<(), ConsensusError> {
        let version = ctx.tx.version;
        let payload = AllocationPayload::from_tx(ctx.tx)
            .ok_or_else(|| inconsistent(ctx, "cannot decode asset allocation"))?;
        let mut sender = delta.allocation_snapshot(&self.stores, &payload.tuple)?;

        match version {
            TX_VERSION_ALLOCATION_LOCK => {
                delta.push_lock(LockChange::Unlock(payload.locked_outpoint.clone()));
                sender.locked_outpoint = OutPoint::null();
            }
            TX_VERSION_ALLOCATION_BURN => {
                let burn = BurnData::from_tx(ctx.tx)
                    .ok_or_else(|| inconsistent(ctx, "cannot decode burn data"))?;
                let sink = AllocationTuple::burn_sink(payload.tuple.guid);
                let receivers = rewind_receivers(self, ctx, &[(sink, burn.amount)], delta)?;
                sender.balance += burn.amount;
                for receiver in receivers {
                    delta.set_allocation(receiver);
                }
            }
            _ => {
                let credits = payload_credits(&payload);
                let receivers = rewind_receivers(self, ctx, &credits, delta)?;
                for (_, amount) in &credits {
                    sender.balance += amount;
                }
                for receiver in receivers {
                    delta.set_allocation(receiver);
                }
            }
        }
        if sender.is_null() {
            sender.set_null();
        }
        delta.set_allocation(sender);

        self.erase_index(ctx, delta);
        paydayd_log::log_category!(
            Category::Asset,
            "disconnected {} from {} at height {}",
            op_name(version),
            payload.tuple,
            ctx.height
        );
        Ok(())
    }

    /// Reverses a bridge mint and releases its replay key.
    pub fn disconnect_mint(&self, ctx: &TxContext<'_>, delta: &mut BlockDelta) -> Result<(), ConsensusError> {
        let payload = MintPayload::from_tx(ctx.tx)
            .ok_or_else(|| inconsistent(ctx, "cannot decode mint"))?;
        let tx_path = rlp::decode(&payload.tx_path)
            .and_then(|item| item.as_u32())
            .map_err(|_| inconsistent(ctx, "cannot decode mint tx path"))?;

        if ctx.tx.version == TX_VERSION_ALLOCATION_MINT {
            let receivers = rewind_receivers(
                self,
                ctx,
                &[(payload.tuple.clone(), payload.value_asset)],
                delta,
            )?;
            for receiver in receivers {
                delta.set_allocation(receiver);
            }
            self.erase_index(ctx, delta);
        }
        delta.erase_mint(MintKey::new(u64::from(payload.block_number), tx_path));

        paydayd_log::log_category!(
            Category::Bridge,
            "disconnected {} from external block {} path {tx_path}",
            op_name(ctx.tx.version),
            payload.block_number
        );
        Ok(())
    }

    fn rollback_asset(
        &self,
        ctx: &TxContext<'_>,
        delta: &mut BlockDelta,
        guid: u32,
    ) -> Result<Asset, ConsensusError> {
        delta
            .asset_snapshot(&self.stores, guid)?
            .ok_or_else(|| inconsistent(ctx, format!("asset {guid} missing during rollback")))
    }
}
