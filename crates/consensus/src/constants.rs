//! Consensus-wide constants for the asset ledger and the bridge.

/// Base-coin bridge mint (credits native coin from a proven external burn).
pub const TX_VERSION_MINT: i32 = 0x7401;
/// Creates a new asset under a fresh GUID.
pub const TX_VERSION_ASSET_ACTIVATE: i32 = 0x7402;
/// Changes supply, public data, contract or flags of an existing asset.
pub const TX_VERSION_ASSET_UPDATE: i32 = 0x7403;
/// Hands asset ownership to a new witness address.
pub const TX_VERSION_ASSET_TRANSFER: i32 = 0x7404;
/// Moves issuer balance into per-owner allocations.
pub const TX_VERSION_ASSET_SEND: i32 = 0x7405;
/// Asset bridge mint (credits an allocation from a proven external burn).
pub const TX_VERSION_ALLOCATION_MINT: i32 = 0x7406;
pub const TX_VERSION_ALLOCATION_SEND: i32 = 0x7407;
pub const TX_VERSION_ALLOCATION_BURN: i32 = 0x7408;
pub const TX_VERSION_ALLOCATION_LOCK: i32 = 0x7409;

/// Asset GUIDs at or below this value collide with version tags and are rejected.
pub const MIN_ASSET_GUID_EXCLUSIVE: u32 = TX_VERSION_MINT as u32;

/// Maximum number of receivers in one asset or allocation send (network rule).
pub const MAX_RECEIVERS_PER_SEND: usize = 250;
/// Maximum size of an asset's public data blob, in bytes.
pub const MAX_VALUE_LENGTH: usize = 512;
/// Size of an external-chain contract address, in bytes.
pub const CONTRACT_ADDRESS_LEN: usize = 20;
/// Symbol length bounds, in bytes.
pub const MIN_SYMBOL_LEN: usize = 1;
pub const MAX_SYMBOL_LEN: usize = 8;

pub const ASSET_UPDATE_ADMIN: u8 = 1;
pub const ASSET_UPDATE_DATA: u8 = 2;
pub const ASSET_UPDATE_CONTRACT: u8 = 4;
pub const ASSET_UPDATE_SUPPLY: u8 = 8;
pub const ASSET_UPDATE_FLAGS: u8 = 16;
pub const ASSET_UPDATE_ALL: u8 = 31;

/// Witness program of the synthetic tuple credited by allocation burns.
pub const BURN_SINK_PROGRAM: &[u8] = b"burn";

/// Default zdag settle delay before an arrival counts as settled, in milliseconds.
pub const DEFAULT_ZDAG_SETTLE_MS: i64 = 1_000;
/// Arrivals older than this (against tip median time) are pruned, in milliseconds.
pub const DEFAULT_ZDAG_EXPIRY_MS: i64 = 1_800_000;

/// Number of external-chain roots that stay valid for mint proofs.
pub const MAX_EXTERNAL_ROOTS: u32 = 40_000;
/// Roots older than this many multiples of the validity window are pruned.
pub const EXTERNAL_ROOT_RETENTION_FACTOR: u32 = 3;
/// Radius of the height range re-requested around a broken root hash chain.
pub const ROOT_AUDIT_REFETCH_RADIUS: u32 = 50;
