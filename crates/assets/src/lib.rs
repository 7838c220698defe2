//! Asset and asset-allocation ledger: consensus checks, rollback, the zdag
//! mempool overlay, bridge mint verification and the per-block driver.

pub mod allocation;
pub mod asset;
pub mod auth;
pub mod classify;
pub mod config;
pub mod context;
pub mod db;
pub mod delta;
pub mod driver;
pub mod engine;
pub mod error;
pub mod index;
pub mod mode;
pub mod payload;
pub mod zdag;

mod allocation_ops;
mod asset_ops;
mod disconnect;
mod locked;
mod mint;

pub use allocation::{AllocationTuple, AssetAllocation};
pub use asset::Asset;
pub use auth::{find_owner_signature, Coin, CoinView, MemoryCoinView};
pub use classify::{classify, OpClass};
pub use config::{AssetConfig, BridgeSettings};
pub use context::{ChainContext, ManualChain, MempoolSet, MempoolView};
pub use db::LedgerStores;
pub use delta::{BlockDelta, LockChange};
pub use driver::{BlockMode, BlockOutcome, LedgerBlock, LedgerDriver};
pub use engine::{AssetEngine, TxContext};
pub use error::{ConsensusError, DriverError, ErrorKind};
pub use index::{IndexEntry, IndexKey};
pub use mode::ValidationMode;
pub use payload::{AllocationPayload, BurnData, MintPayload};
pub use zdag::{SavedSender, ZdagOverlay, ZdagPolicy, ZdagStatus};
