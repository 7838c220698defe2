//! External header roots indexed by external block height.

use paydayd_consensus::constants::{
    EXTERNAL_ROOT_RETENTION_FACTOR, MAX_EXTERNAL_ROOTS, ROOT_AUDIT_REFETCH_RADIUS,
};
use paydayd_consensus::Hash256;
use paydayd_log::Category;
use paydayd_storage::{Column, KeyValueStore, StoreError, WriteBatch};

use crate::cursor::{SyncCursor, SyncHeights};

const ROOT_LEN: usize = 128;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExternalTxRoot {
    pub block_hash: Hash256,
    pub prev_block_hash: Hash256,
    pub tx_root: Hash256,
    pub receipt_root: Hash256,
}

impl ExternalTxRoot {
    pub fn encode(&self) -> [u8; ROOT_LEN] {
        let mut out = [0u8; ROOT_LEN];
        out[0..32].copy_from_slice(&self.block_hash);
        out[32..64].copy_from_slice(&self.prev_block_hash);
        out[64..96].copy_from_slice(&self.tx_root);
        out[96..128].copy_from_slice(&self.receipt_root);
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ROOT_LEN {
            return None;
        }
        Some(Self {
            block_hash: bytes[0..32].try_into().ok()?,
            prev_block_hash: bytes[32..64].try_into().ok()?,
            tx_root: bytes[64..96].try_into().ok()?,
            receipt_root: bytes[96..128].try_into().ok()?,
        })
    }
}

/// Inclusive range of external heights whose roots should be fetched again.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MissingRange {
    pub from: u32,
    pub to: u32,
}

impl MissingRange {
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }
}

pub struct TxRootStore<S> {
    store: S,
}

impl<S> TxRootStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

fn height_key(height: u32) -> [u8; 4] {
    height.to_be_bytes()
}

fn decode_height(key: &[u8]) -> Result<u32, StoreError> {
    let bytes: [u8; 4] = key
        .try_into()
        .map_err(|_| StoreError::corrupt("external root key"))?;
    Ok(u32::from_be_bytes(bytes))
}

impl<S: KeyValueStore> TxRootStore<S> {
    pub fn get(&self, height: u32) -> Result<Option<ExternalTxRoot>, StoreError> {
        let bytes = match self.store.get(Column::ExternalTxRoot, &height_key(height))? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        ExternalTxRoot::decode(&bytes)
            .ok_or_else(|| StoreError::corrupt("external root"))
            .map(Some)
    }

    /// All stored roots in ascending height order.
    pub fn all(&self) -> Result<Vec<(u32, ExternalTxRoot)>, StoreError> {
        let mut roots = Vec::new();
        self.store
            .for_each_prefix(Column::ExternalTxRoot, &[], &mut |key, value| {
                let height = decode_height(key)?;
                let root = ExternalTxRoot::decode(value)
                    .ok_or_else(|| StoreError::corrupt("external root"))?;
                roots.push((height, root));
                Ok(())
            })?;
        Ok(roots)
    }

    pub fn flush_write(
        &self,
        roots: &[(u32, ExternalTxRoot)],
        cursor: &SyncCursor,
    ) -> Result<(), StoreError> {
        let (Some(first), Some(last)) = (roots.first(), roots.last()) else {
            return Ok(());
        };
        let mut batch = WriteBatch::new();
        batch.reserve(roots.len());
        for (height, root) in roots {
            batch.put(Column::ExternalTxRoot, height_key(*height), root.encode());
        }
        self.store.write_batch(&batch)?;
        if let Some(max) = roots.iter().map(|(height, _)| *height).max() {
            cursor.observe_root(max);
        }
        paydayd_log::log_category!(
            Category::Bridge,
            "flushed {} external roots, heights {}..={}",
            roots.len(),
            first.0,
            last.0
        );
        Ok(())
    }

    pub fn flush_erase(&self, heights: &[u32]) -> Result<(), StoreError> {
        let (Some(first), Some(last)) = (heights.first(), heights.last()) else {
            return Ok(());
        };
        let mut batch = WriteBatch::new();
        batch.reserve(heights.len());
        for height in heights {
            batch.delete(Column::ExternalTxRoot, height_key(*height));
        }
        self.store.write_batch(&batch)?;
        paydayd_log::log_category!(
            Category::Bridge,
            "erased {} external roots, heights {}..={}",
            heights.len(),
            first,
            last
        );
        Ok(())
    }

    /// Drops roots outside the retention window ending at `new_sync` and
    /// records the new heights on the cursor. A zero `new_sync` only rescans
    /// the current height, as done at startup.
    pub fn prune(&self, new_sync: u32, cursor: &SyncCursor) -> Result<(), StoreError> {
        let window = MAX_EXTERNAL_ROOTS * EXTERNAL_ROOT_RETENTION_FACTOR;
        if new_sync > 0 && new_sync < window {
            paydayd_log::log_category!(
                Category::Bridge,
                "nothing to prune at external sync height {new_sync}"
            );
            return Ok(());
        }
        let cutoff = new_sync.saturating_sub(window);
        let mut current = cursor.heights().current;
        let mut erase = Vec::new();
        self.store
            .for_each_prefix(Column::ExternalTxRoot, &[], &mut |key, _| {
                let height = decode_height(key)?;
                if new_sync > 0 && (height < cutoff || height > new_sync) {
                    erase.push(height);
                } else if height > current {
                    current = height;
                }
                Ok(())
            })?;
        cursor.set_heights(SyncHeights {
            sync: new_sync,
            current,
        });
        self.flush_erase(&erase)
    }

    /// Reports height ranges that must be fetched again: gaps in the stored
    /// sequence, the span below the first stored root inside the validity
    /// window, and the neighbourhood of every broken hash link. Roots that
    /// break the hash chain are erased.
    pub fn audit(&self, cursor: &SyncCursor) -> Result<Vec<MissingRange>, StoreError> {
        let sync = cursor.heights().sync;
        let cutoff = sync.saturating_sub(MAX_EXTERNAL_ROOTS);
        let roots = self.all()?;
        let mut missing = Vec::new();
        if roots.len() < 2 {
            missing.push(MissingRange::new(cutoff, sync));
            return Ok(missing);
        }

        let first = roots[0].0;
        if sync >= MAX_EXTERNAL_ROOTS && first > cutoff {
            missing.push(MissingRange::new(cutoff, first - 1));
        }

        let mut broken = Vec::new();
        for pair in roots.windows(2) {
            let (prev_height, prev_root) = &pair[0];
            let (height, root) = &pair[1];
            let next = prev_height + 1;
            if *height > next {
                missing.push(MissingRange::new(next, height - 1));
            } else if root.prev_block_hash != prev_root.block_hash {
                missing.push(MissingRange::new(
                    height.saturating_sub(ROOT_AUDIT_REFETCH_RADIUS),
                    height.saturating_add(ROOT_AUDIT_REFETCH_RADIUS).min(sync),
                ));
                broken.push(*height);
            }
        }
        if !broken.is_empty() {
            paydayd_log::log_warn!(
                "Warning: detected {} inconsistent external root hash links, removing",
                broken.len()
            );
            self.flush_erase(&broken)?;
        }
        Ok(missing)
    }
}
