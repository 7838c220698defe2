//! Shared view of how far the external chain has been ingested.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SyncHeights {
    /// Highest external height the relayer reports as synced.
    pub sync: u32,
    /// Highest external height with a stored root.
    pub current: u32,
}

#[derive(Debug, Default)]
pub struct SyncCursor {
    heights: RwLock<SyncHeights>,
    loaded: AtomicBool,
    synced: AtomicBool,
}

impl SyncCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heights(&self) -> SyncHeights {
        match self.heights.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_heights(&self, heights: SyncHeights) {
        match self.heights.write() {
            Ok(mut guard) => *guard = heights,
            Err(poisoned) => *poisoned.into_inner() = heights,
        }
    }

    /// Raises the current height if `height` is above it.
    pub fn observe_root(&self, height: u32) {
        let mut heights = self.heights();
        if height > heights.current {
            heights.current = height;
            self.set_heights(heights);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::Release);
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::Release);
    }
}
