use paydayd_consensus::constants::TX_VERSION_ALLOCATION_SEND;
use paydayd_primitives::{OutPoint, Transaction};
use paydayd_storage::{KeyValueStore, StoreError};

use crate::engine::AssetEngine;
use crate::error::{ConsensusError, ErrorKind};
use crate::payload::AllocationPayload;

/// Rejects an allocation send spending an outpoint locked by some other
/// allocation. `own_lock` is the sender's lock, null when it has none.
pub(crate) fn reject_foreign_locks(
    tx: &Transaction,
    own_lock: &OutPoint,
    mut is_locked: impl FnMut(&OutPoint) -> Result<bool, StoreError>,
) -> Result<(), ConsensusError> {
    for input in &tx.vin {
        if input.prevout != *own_lock && is_locked(&input.prevout)? {
            return Err(ConsensusError::unauthorized(1025, "foreign-lockpoint"));
        }
    }
    Ok(())
}

impl<S: KeyValueStore> AssetEngine<S> {
    /// Locked outpoints may only be spent by an allocation send of the
    /// allocation holding the lock.
    pub fn check_locked_outpoints(&self, tx: &Transaction) -> Result<(), ConsensusError> {
        if tx.version != TX_VERSION_ALLOCATION_SEND {
            for input in &tx.vin {
                if self.stores.is_outpoint_locked(&input.prevout)? {
                    return Err(ConsensusError::unauthorized(1024, "non-allocation-input"));
                }
            }
            return Ok(());
        }

        let payload = AllocationPayload::from_tx(tx)
            .ok_or_else(|| ConsensusError::malformed(1001, "allocation-send-payload"))?;
        let allocation = self.stores.get_allocation(&payload.tuple)?.ok_or_else(|| {
            ConsensusError::new(
                ErrorKind::UnknownAllocation,
                1010,
                format!("Cannot find sender asset allocation {}", payload.tuple),
            )
        })?;
        let locked = &allocation.locked_outpoint;
        reject_foreign_locks(tx, locked, |outpoint| self.stores.is_outpoint_locked(outpoint))?;
        if locked.is_null() {
            return Ok(());
        }
        let spends_lock = tx.vin.iter().any(|input| input.prevout == *locked);
        if spends_lock && self.stores.is_outpoint_locked(locked)? {
            Ok(())
        } else {
            Err(ConsensusError::unauthorized(1025, "missing-lockpoint"))
        }
    }
}
