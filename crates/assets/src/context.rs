//! Views of the base chain and mempool consumed by the ledger.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use paydayd_consensus::Hash256;

pub trait ChainContext: Send + Sync {
    /// Height of the active chain tip.
    fn height(&self) -> u32;
    /// Median time past of the tip, in seconds.
    fn median_time_past(&self) -> i64;
    /// Wall clock, in milliseconds.
    fn now_ms(&self) -> i64;
    fn is_initial_block_download(&self) -> bool;
}

/// Chain context whose values are set explicitly by the embedding node.
#[derive(Debug, Default)]
pub struct ManualChain {
    height: AtomicU32,
    median_time_past: AtomicI64,
    now_ms: AtomicI64,
    initial_download: AtomicBool,
}

impl ManualChain {
    pub fn new(height: u32, median_time_past: i64, now_ms: i64) -> Self {
        Self {
            height: AtomicU32::new(height),
            median_time_past: AtomicI64::new(median_time_past),
            now_ms: AtomicI64::new(now_ms),
            initial_download: AtomicBool::new(false),
        }
    }

    /// Context at `height` with both clocks taken from the system time.
    pub fn at_system_time(height: u32) -> Self {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0);
        Self::new(height, now_ms / 1000, now_ms)
    }

    pub fn set_height(&self, height: u32) {
        self.height.store(height, Ordering::Release);
    }

    pub fn set_median_time_past(&self, seconds: i64) {
        self.median_time_past.store(seconds, Ordering::Release);
    }

    pub fn set_now_ms(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::Release);
    }

    pub fn advance_ms(&self, delta: i64) {
        self.now_ms.fetch_add(delta, Ordering::AcqRel);
    }

    pub fn set_initial_block_download(&self, active: bool) {
        self.initial_download.store(active, Ordering::Release);
    }
}

impl ChainContext for ManualChain {
    fn height(&self) -> u32 {
        self.height.load(Ordering::Acquire)
    }

    fn median_time_past(&self) -> i64 {
        self.median_time_past.load(Ordering::Acquire)
    }

    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::Acquire)
    }

    fn is_initial_block_download(&self) -> bool {
        self.initial_download.load(Ordering::Acquire)
    }
}

pub trait MempoolView: Send + Sync {
    fn contains(&self, txid: &Hash256) -> bool;
}

/// Txid set standing in for the node's mempool.
#[derive(Debug, Default)]
pub struct MempoolSet {
    txids: RwLock<HashSet<Hash256>>,
}

impl MempoolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, txid: Hash256) {
        match self.txids.write() {
            Ok(mut guard) => guard.insert(txid),
            Err(poisoned) => poisoned.into_inner().insert(txid),
        };
    }

    pub fn remove(&self, txid: &Hash256) {
        match self.txids.write() {
            Ok(mut guard) => guard.remove(txid),
            Err(poisoned) => poisoned.into_inner().remove(txid),
        };
    }

    pub fn len(&self) -> usize {
        match self.txids.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MempoolView for MempoolSet {
    fn contains(&self, txid: &Hash256) -> bool {
        match self.txids.read() {
            Ok(guard) => guard.contains(txid),
            Err(poisoned) => poisoned.into_inner().contains(txid),
        }
    }
}
