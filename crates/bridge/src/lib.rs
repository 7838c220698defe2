//! External-chain bridge support: RLP, Merkle-Patricia proofs, burn call data,
//! and the stores that track external header roots and spent mints.

pub mod calldata;
pub mod cursor;
pub mod mints;
pub mod rlp;
pub mod roots;
pub mod trie;

pub use calldata::{encode_burn_call, parse_burn_call, BurnCall, CallDataError};
pub use cursor::{SyncCursor, SyncHeights};
pub use mints::{MintKey, MintKeyStore};
pub use rlp::{RlpError, RlpItem};
pub use roots::{ExternalTxRoot, MissingRange, TxRootStore};
pub use trie::{KeccakTrieVerifier, ProofError, ProofVerifier};
