//! Bridge mints: base-coin and allocation credits backed by SPV proofs of a
//! burn on the external chain.

use paydayd_bridge::rlp::{self, RlpItem};
use paydayd_bridge::{parse_burn_call, BurnCall, MintKey};
use paydayd_consensus::constants::{MAX_EXTERNAL_ROOTS, TX_VERSION_ALLOCATION_MINT};
use paydayd_consensus::{asset_range, Hash256};
use paydayd_log::Category;
use paydayd_primitives::script::witness_program;
use paydayd_storage::KeyValueStore;

use crate::delta::BlockDelta;
use crate::engine::{AssetEngine, TxContext};
use crate::error::{ConsensusError, ErrorKind};
use crate::payload::MintPayload;

const ZERO_ROOT: Hash256 = [0u8; 32];
const RECEIPT_FIELDS: usize = 4;
const MIN_TX_FIELDS: usize = 6;
const TX_TO_FIELD: usize = 3;
const TX_DATA_FIELD: usize = 5;

fn unavailable(message: impl Into<String>) -> ConsensusError {
    ConsensusError::new(ErrorKind::ProofUnavailable, 1001, message)
}

fn mismatch(message: impl Into<String>) -> ConsensusError {
    ConsensusError::new(ErrorKind::ProofMismatch, 1001, message)
}

/// Receipt must be `[status, cumulative gas, bloom, logs]` with status 1.
fn check_receipt(receipt: &[u8]) -> Result<(), ConsensusError> {
    let items = rlp::decode_list(receipt)
        .map_err(|err| ConsensusError::malformed(1001, format!("Invalid receipt: {err}")))?;
    if items.len() != RECEIPT_FIELDS {
        return Err(ConsensusError::malformed(1001, "Invalid receipt field count"));
    }
    match items[0].as_u64() {
        Ok(1) => Ok(()),
        _ => Err(ConsensusError::malformed(1001, "Receipt status is not success")),
    }
}

/// Receiver contract and call data of the proven external transaction.
fn decode_tx_call<'a>(items: &'a [RlpItem<'a>]) -> Result<(&'a [u8], &'a [u8]), ConsensusError> {
    if items.len() < MIN_TX_FIELDS {
        return Err(mismatch("Invalid tx field count"));
    }
    let data = items[TX_DATA_FIELD]
        .as_bytes()
        .map_err(|_| mismatch("Invalid tx data"))?;
    let to = items[TX_TO_FIELD]
        .as_bytes()
        .map_err(|_| mismatch("Invalid tx receiver"))?;
    if to.len() != 20 {
        return Err(mismatch("Invalid tx receiver"));
    }
    Ok((to, data))
}

impl<S: KeyValueStore> AssetEngine<S> {
    /// Verifies a base-coin or allocation mint and credits it to `delta`.
    pub fn apply_mint(&self, ctx: &TxContext<'_>, delta: &mut BlockDelta) -> Result<(), ConsensusError> {
        if !self.params.bridge_enabled(ctx.height) {
            return Err(ConsensusError::malformed(1001, "Bridge is disabled at this height"));
        }
        let payload = MintPayload::from_tx(ctx.tx)
            .ok_or_else(|| ConsensusError::malformed(1001, "Cannot unserialize mint data"))?;
        let allocation_mint = ctx.tx.version == TX_VERSION_ALLOCATION_MINT;
        if allocation_mint == payload.tuple.is_null() {
            return Err(ConsensusError::malformed(1001, "Mint receiver does not match the operation"));
        }
        let asset = if allocation_mint {
            let asset = delta
                .asset_snapshot(&self.stores, payload.tuple.guid)?
                .ok_or_else(|| {
                    ConsensusError::new(ErrorKind::UnknownAsset, 1001, "Mint asset not found")
                })?;
            Some(asset)
        } else {
            None
        };

        self.check_external_root(&payload)?;
        check_receipt(&payload.receipt_value)?;

        let tx_path = rlp::decode(&payload.tx_path)
            .and_then(|item| item.as_u32())
            .map_err(|_| ConsensusError::malformed(1001, "Invalid tx path"))?;
        let key = MintKey::new(u64::from(payload.block_number), tx_path);
        if delta.has_pending_mint(&key) || self.stores.mints().contains(&key)? {
            return Err(mismatch("Mint already processed"));
        }

        self.verifier
            .verify(
                &payload.receipt_root,
                &payload.tx_path,
                &payload.receipt_value,
                &payload.receipt_parent_nodes,
            )
            .map_err(|err| mismatch(format!("Could not verify receipt proof: {err}")))?;
        self.verifier
            .verify(
                &payload.tx_root,
                &payload.tx_path,
                &payload.tx_value,
                &payload.tx_parent_nodes,
            )
            .map_err(|err| mismatch(format!("Could not verify tx proof: {err}")))?;

        let items = rlp::decode_list(&payload.tx_value)
            .map_err(|err| mismatch(format!("Invalid tx: {err}")))?;
        let (to, data) = decode_tx_call(&items)?;
        let expected: &[u8] = match &asset {
            Some(asset) => asset.contract.as_slice(),
            None => &self.params.bridge.coin_contract[..],
        };
        if to != expected {
            return Err(mismatch("Receiver contract does not match the bridge"));
        }
        let call = parse_burn_call(data, &self.params.bridge.burn_selector)
            .map_err(|err| ConsensusError::malformed(1001, format!("Invalid burn call: {err}")))?;

        match asset {
            None => self.check_coin_mint(ctx, &call)?,
            Some(asset) => {
                if call.destination != payload.tuple.address {
                    return Err(mismatch("Mint destination does not match the receiver"));
                }
                if call.asset_guid != asset.guid {
                    return Err(mismatch("Mint asset does not match the burned asset"));
                }
                if call.amount != payload.value_asset {
                    return Err(mismatch("Mint amount does not match the burned amount"));
                }
                if call.amount <= 0 || !asset_range(payload.value_asset) {
                    return Err(ConsensusError::supply(2029, "Mint amount out of range"));
                }
                let mut receiver = delta.allocation_snapshot(&self.stores, &payload.tuple)?;
                receiver.balance = receiver
                    .balance
                    .checked_add(payload.value_asset)
                    .ok_or_else(|| ConsensusError::supply(2029, "Receiver balance out of range"))?;
                delta.set_allocation(receiver);
                if ctx.mode.writes_state() {
                    self.queue_index(ctx, delta);
                }
            }
        }

        delta.push_mint(key);
        if ctx.mode.writes_state() {
            paydayd_log::log_category!(
                Category::Bridge,
                "connected mint of {} from external block {} path {tx_path}",
                call.amount,
                payload.block_number
            );
        }
        Ok(())
    }

    /// Root availability, validity window and confirmation depth of the
    /// external block the proofs refer to.
    fn check_external_root(&self, payload: &MintPayload) -> Result<(), ConsensusError> {
        let block = payload.block_number;
        let root = self.stores.roots().get(block)?;
        let enforce = !self.chain.is_initial_block_download()
            && !self.bridge.lite_mode
            && self.cursor.is_loaded()
            && self.cursor.is_synced();
        if enforce {
            if root.is_none() {
                return Err(unavailable(format!("Missing external root for block {block}")));
            }
            let heights = self.cursor.heights();
            if heights.sync >= MAX_EXTERNAL_ROOTS && block <= heights.sync - MAX_EXTERNAL_ROOTS {
                return Err(unavailable(format!("External block {block} is too old")));
            }
            let depth = if self.bridge.geth_testnet {
                self.params.bridge.test_confirmations
            } else {
                self.params.bridge.confirmations
            };
            if heights.current < block
                || heights.sync == 0
                || heights.sync.saturating_sub(block) < depth
            {
                return Err(unavailable(format!(
                    "External block {block} lacks {depth} confirmations"
                )));
            }
        }
        if let Some(root) = root {
            let tx_mismatch = root.tx_root != ZERO_ROOT && root.tx_root != payload.tx_root;
            let receipt_mismatch =
                root.receipt_root != ZERO_ROOT && root.receipt_root != payload.receipt_root;
            if tx_mismatch || receipt_mismatch {
                return Err(unavailable("Mismatching Tx Roots"));
            }
        }
        Ok(())
    }

    /// A coin mint pays the burned amount to the destination in output 0.
    fn check_coin_mint(&self, ctx: &TxContext<'_>, call: &BurnCall) -> Result<(), ConsensusError> {
        let output = ctx
            .tx
            .vout
            .first()
            .ok_or_else(|| ConsensusError::malformed(1001, "Mint has no outputs"))?;
        let paid_to = witness_program(&output.script_pubkey)
            .ok_or_else(|| mismatch("Mint output is not a witness program"))?;
        if paid_to != call.destination {
            return Err(mismatch("Mint output does not pay the burn destination"));
        }
        if call.asset_guid != 0 {
            return Err(mismatch("Coin mint carries an asset guid"));
        }
        if call.amount != output.value {
            return Err(mismatch("Mint output value does not match the burned amount"));
        }
        Ok(())
    }
}
