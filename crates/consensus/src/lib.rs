//! Consensus constants, monetary ranges, and per-network asset/bridge parameters.

pub mod constants;
pub mod money;
pub mod params;

pub use money::{asset_range, asset_range_with_precision, money_range, Amount, COIN, MAX_ASSET};
pub use params::{consensus_params, BridgeParams, ConsensusParams, Network};

pub type Hash256 = [u8; 32];
