//! Asset activation, update, transfer and issuer sends.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use paydayd_consensus::constants::{
    ASSET_UPDATE_ADMIN, ASSET_UPDATE_ALL, ASSET_UPDATE_CONTRACT, ASSET_UPDATE_DATA,
    ASSET_UPDATE_FLAGS, ASSET_UPDATE_SUPPLY, CONTRACT_ADDRESS_LEN, MAX_RECEIVERS_PER_SEND,
    MAX_SYMBOL_LEN, MAX_VALUE_LENGTH, MIN_ASSET_GUID_EXCLUSIVE, MIN_SYMBOL_LEN,
    TX_VERSION_ASSET_ACTIVATE, TX_VERSION_ASSET_SEND, TX_VERSION_ASSET_TRANSFER,
    TX_VERSION_ASSET_UPDATE,
};
use paydayd_consensus::{asset_range_with_precision, money::MAX_ASSET_PRECISION};
use paydayd_log::Category;
use paydayd_primitives::WitnessAddress;
use paydayd_storage::KeyValueStore;

use crate::allocation::{AllocationTuple, AssetAllocation};
use crate::asset::Asset;
use crate::auth::{find_owner_signature, CoinView};
use crate::classify::op_name;
use crate::delta::BlockDelta;
use crate::engine::{AssetEngine, TxContext};
use crate::error::{ConsensusError, ErrorKind};
use crate::payload::AllocationPayload;

/// Decoded payload of an asset transaction.
enum AssetOp {
    Record(Asset),
    Send(AllocationPayload),
}

impl AssetOp {
    fn guid(&self) -> u32 {
        match self {
            AssetOp::Record(asset) => asset.guid,
            AssetOp::Send(payload) => payload.tuple.guid,
        }
    }
}

fn contract_len_ok(contract: &[u8]) -> bool {
    contract.is_empty() || contract.len() == CONTRACT_ADDRESS_LEN
}

/// Stateless checks of the payload, before any record is read.
fn check_payload(version: i32, op: &AssetOp) -> Result<(), ConsensusError> {
    match op {
        AssetOp::Record(asset) => {
            if asset.public_data.len() > MAX_VALUE_LENGTH {
                return Err(ConsensusError::invariant(2004, "Public data too big"));
            }
            match version {
                TX_VERSION_ASSET_ACTIVATE => {
                    if asset.guid <= MIN_ASSET_GUID_EXCLUSIVE {
                        return Err(ConsensusError::invariant(2005, "Asset guid invalid"));
                    }
                    if !contract_len_ok(&asset.contract) {
                        return Err(ConsensusError::invariant(2005, "Contract address not proper size"));
                    }
                    if asset.precision > MAX_ASSET_PRECISION {
                        return Err(ConsensusError::invariant(2005, "Precision must be between 0 and 8"));
                    }
                    if !(MIN_SYMBOL_LEN..=MAX_SYMBOL_LEN).contains(&asset.symbol.len()) {
                        return Err(ConsensusError::invariant(2005, "Symbol must be between 1 and 8 bytes"));
                    }
                    if !asset_range_with_precision(asset.max_supply, asset.precision) {
                        return Err(ConsensusError::supply(2014, "Max supply out of money range"));
                    }
                    if asset.balance < 0 || asset.balance > asset.max_supply {
                        return Err(ConsensusError::supply(2015, "Total supply cannot exceed maximum supply"));
                    }
                    if !asset.owner.is_valid() {
                        return Err(ConsensusError::invariant(2015, "Address specified is invalid"));
                    }
                    if asset.update_flags > ASSET_UPDATE_ALL {
                        return Err(ConsensusError::invariant(2026, "Invalid update flags"));
                    }
                    if !asset.transfer_to.is_null() {
                        return Err(ConsensusError::invariant(2026, "Cannot transfer on activation"));
                    }
                }
                TX_VERSION_ASSET_UPDATE => {
                    if asset.balance < 0 {
                        return Err(ConsensusError::invariant(2017, "Balance must be greater than or equal to 0"));
                    }
                    if !contract_len_ok(&asset.contract) {
                        return Err(ConsensusError::invariant(2005, "Contract address not proper size"));
                    }
                    if asset.update_flags > ASSET_UPDATE_ALL {
                        return Err(ConsensusError::invariant(2026, "Invalid update flags"));
                    }
                    if !asset.transfer_to.is_null() {
                        return Err(ConsensusError::invariant(2026, "Cannot transfer on update"));
                    }
                }
                TX_VERSION_ASSET_TRANSFER => {
                    if asset.transfer_to.is_null() {
                        return Err(ConsensusError::invariant(2026, "Transfer address missing"));
                    }
                }
                _ => {}
            }
        }
        AssetOp::Send(payload) => {
            if payload.receivers.is_empty() {
                return Err(ConsensusError::invariant(2020, "Asset send must have at least one receiver"));
            }
            if payload.receivers.len() > MAX_RECEIVERS_PER_SEND {
                return Err(ConsensusError::invariant(2021, "Too many receivers in one send"));
            }
        }
    }
    Ok(())
}

impl<S: KeyValueStore> AssetEngine<S> {
    /// Validates an asset operation and applies it to `delta`.
    pub fn apply_asset(
        &self,
        ctx: &TxContext<'_>,
        coins: &dyn CoinView,
        delta: &mut BlockDelta,
    ) -> Result<(), ConsensusError> {
        let version = ctx.tx.version;
        let op = if version == TX_VERSION_ASSET_SEND {
            AllocationPayload::from_tx(ctx.tx).map(AssetOp::Send)
        } else {
            Asset::from_tx(ctx.tx).map(AssetOp::Record)
        }
        .ok_or_else(|| ConsensusError::malformed(2000, "Cannot unserialize data inside of this transaction relating to an asset"))?;
        check_payload(version, &op)?;

        let guid = op.guid();
        let stored = delta.asset_snapshot(&self.stores, guid)?;
        let mut asset = match (version, stored) {
            (TX_VERSION_ASSET_ACTIVATE, Some(_)) => {
                return Err(ConsensusError::invariant(2041, "Asset already exists"));
            }
            (TX_VERSION_ASSET_ACTIVATE, None) => Asset::default(),
            (_, Some(asset)) => asset,
            (_, None) => {
                return Err(ConsensusError::new(
                    ErrorKind::UnknownAsset,
                    2024,
                    format!("Asset {guid} not found"),
                ));
            }
        };

        match op {
            AssetOp::Record(record) => match version {
                TX_VERSION_ASSET_ACTIVATE => {
                    if !find_owner_signature(coins, ctx.tx, &record.owner, None) {
                        return Err(ConsensusError::unauthorized(1015, "Cannot find owner signature in inputs"));
                    }
                    asset = record;
                    asset.total_supply = asset.balance;
                }
                TX_VERSION_ASSET_TRANSFER => {
                    self.check_owner(ctx, coins, &asset, &record)?;
                    asset.owner = record.transfer_to;
                    asset.transfer_to = WitnessAddress::null();
                }
                _ => {
                    self.check_owner(ctx, coins, &asset, &record)?;
                    apply_update(&mut asset, &record)?;
                }
            },
            AssetOp::Send(payload) => {
                self.apply_issuer_send(ctx, coins, &mut asset, &payload, delta)?;
            }
        }

        asset.height = ctx.height;
        asset.txid = ctx.txid;
        delta.set_asset(guid, asset);

        if ctx.mode.writes_state() {
            self.queue_index(ctx, delta);
            paydayd_log::log_category!(
                Category::Asset,
                "connected asset {} with guid {guid} at height {}",
                op_name(version),
                ctx.height
            );
        }
        Ok(())
    }

    /// Transfers and updates must be signed by the stored owner and may not
    /// touch the frozen fields.
    fn check_owner(
        &self,
        ctx: &TxContext<'_>,
        coins: &dyn CoinView,
        stored: &Asset,
        record: &Asset,
    ) -> Result<(), ConsensusError> {
        if stored.guid != record.guid || stored.owner != record.owner {
            return Err(ConsensusError::unauthorized(1015, "Asset owner mismatch"));
        }
        if !find_owner_signature(coins, ctx.tx, &stored.owner, None) {
            return Err(ConsensusError::unauthorized(1015, "Cannot find owner signature in inputs"));
        }
        if record.precision != stored.precision || record.symbol != stored.symbol {
            return Err(ConsensusError::invariant(1015, "Cannot change symbol or precision"));
        }
        Ok(())
    }

    fn apply_issuer_send(
        &self,
        ctx: &TxContext<'_>,
        coins: &dyn CoinView,
        asset: &mut Asset,
        payload: &AllocationPayload,
        delta: &mut BlockDelta,
    ) -> Result<(), ConsensusError> {
        if asset.owner != payload.tuple.address
            || !find_owner_signature(coins, ctx.tx, &asset.owner, None)
        {
            return Err(ConsensusError::unauthorized(1015, "Cannot find owner signature in inputs"));
        }
        if payload.receivers.iter().any(|(_, amount)| *amount <= 0) {
            return Err(ConsensusError::invariant(2032, "Receiving amount must be positive"));
        }
        let total = payload
            .total()
            .ok_or_else(|| ConsensusError::invariant(2032, "Receiving amounts overflow"))?;
        if asset.balance < total {
            return Err(ConsensusError::new(
                ErrorKind::InsufficientBalance,
                2033,
                format!("Sender balance is insufficient: {} < {total}", asset.balance),
            ));
        }

        let mut credited: BTreeMap<AllocationTuple, AssetAllocation> = BTreeMap::new();
        for (tuple, (_, amount)) in payload.receiver_tuples().zip(payload.receivers.iter()) {
            let receiver = match credited.entry(tuple) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let snapshot = delta.allocation_snapshot(&self.stores, entry.key())?;
                    entry.insert(snapshot)
                }
            };
            receiver.balance = receiver
                .balance
                .checked_add(*amount)
                .ok_or_else(|| ConsensusError::supply(2029, "Receiver balance out of range"))?;
        }
        for receiver in credited.into_values() {
            delta.set_allocation(receiver);
        }
        asset.balance -= total;
        Ok(())
    }
}

fn apply_update(asset: &mut Asset, record: &Asset) -> Result<(), ConsensusError> {
    if record.balance > 0 {
        if asset.update_flags & ASSET_UPDATE_SUPPLY == 0 {
            return Err(ConsensusError::invariant(2026, "Insufficient privileges to update supply"));
        }
        let total = asset
            .total_supply
            .checked_add(record.balance)
            .filter(|total| asset_range_with_precision(*total, asset.precision))
            .ok_or_else(|| ConsensusError::supply(2029, "Total supply out of money range"))?;
        if total > asset.max_supply {
            return Err(ConsensusError::supply(
                2030,
                format!("Total supply {total} cannot exceed maximum supply {}", asset.max_supply),
            ));
        }
        asset.total_supply = total;
        asset.balance += record.balance;
    }
    if !record.public_data.is_empty() {
        if asset.update_flags & ASSET_UPDATE_DATA == 0 {
            return Err(ConsensusError::invariant(2026, "Insufficient privileges to update public data"));
        }
        asset.public_data = record.public_data.clone();
    }
    if !record.contract.is_empty() {
        if asset.update_flags & ASSET_UPDATE_CONTRACT == 0 {
            return Err(ConsensusError::invariant(2026, "Insufficient privileges to update smart contract"));
        }
        asset.contract = record.contract.clone();
    }
    if record.update_flags > 0 {
        if asset.update_flags & (ASSET_UPDATE_FLAGS | ASSET_UPDATE_ADMIN) == 0 {
            return Err(ConsensusError::invariant(2040, "Insufficient privileges to update flags"));
        }
        asset.update_flags = record.update_flags;
    }
    Ok(())
}

