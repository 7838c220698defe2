//! Core transaction types, scripts, witness addresses and consensus serialization.

pub mod encoding;
pub mod hash;
pub mod outpoint;
pub mod script;
pub mod transaction;
pub mod witness;

pub use hash::{hash160, keccak256, sha256, sha256d};
pub use outpoint::OutPoint;
pub use transaction::{Transaction, TransactionDecodeError, TxIn, TxOut};
pub use witness::WitnessAddress;

/// Renders a hash in the byte-reversed hex form used for txids and block hashes.
pub fn hash_to_hex(hash: &paydayd_consensus::Hash256) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parses a byte-reversed hex txid or block hash.
pub fn hash_from_hex(input: &str) -> Option<paydayd_consensus::Hash256> {
    let bytes = hex::decode(input.trim()).ok()?;
    let mut hash: paydayd_consensus::Hash256 = bytes.try_into().ok()?;
    hash.reverse();
    Some(hash)
}
