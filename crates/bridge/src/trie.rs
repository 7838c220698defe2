//! Merkle-Patricia-Trie inclusion proofs against external block roots.

use std::fmt;

use paydayd_consensus::Hash256;
use paydayd_primitives::keccak256;

use crate::rlp::{self, RlpError, RlpItem};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProofError {
    Rlp(RlpError),
    /// A node does not hash to the reference held by its parent.
    NodeHashMismatch { depth: usize },
    /// The key diverges from the path encoded in the trie.
    KeyMismatch,
    ValueMismatch,
    /// The proof ends before reaching the value.
    Incomplete,
    InvalidNode(&'static str),
}

impl fmt::Display for ProofError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofError::Rlp(err) => write!(f, "{err}"),
            ProofError::NodeHashMismatch { depth } => {
                write!(f, "proof node {depth} does not match its reference")
            }
            ProofError::KeyMismatch => write!(f, "proof path does not match key"),
            ProofError::ValueMismatch => write!(f, "proof value does not match"),
            ProofError::Incomplete => write!(f, "proof ended before the value"),
            ProofError::InvalidNode(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ProofError {}

impl From<RlpError> for ProofError {
    fn from(err: RlpError) -> Self {
        ProofError::Rlp(err)
    }
}

/// Verifies that `value` is stored under `key` in the trie committed to by
/// `root`, given the RLP list of nodes on the path from the root.
pub trait ProofVerifier: Send + Sync {
    fn verify(
        &self,
        root: &Hash256,
        key: &[u8],
        value: &[u8],
        parent_nodes: &[u8],
    ) -> Result<(), ProofError>;
}

/// Ethereum-style hexary trie with keccak-256 node hashing.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeccakTrieVerifier;

#[derive(Clone, Copy)]
enum NodeRef<'a> {
    Hash(Hash256),
    Inline(&'a [u8]),
}

impl ProofVerifier for KeccakTrieVerifier {
    fn verify(
        &self,
        root: &Hash256,
        key: &[u8],
        value: &[u8],
        parent_nodes: &[u8],
    ) -> Result<(), ProofError> {
        let nodes = rlp::decode_list(parent_nodes)?;
        let nibbles = to_nibbles(key);
        let mut expected = NodeRef::Hash(*root);
        let mut key_index = 0usize;

        for (depth, node) in nodes.iter().enumerate() {
            match expected {
                NodeRef::Hash(hash) => {
                    if keccak256(node.raw) != hash {
                        return Err(ProofError::NodeHashMismatch { depth });
                    }
                }
                NodeRef::Inline(raw) => {
                    if node.raw != raw {
                        return Err(ProofError::NodeHashMismatch { depth });
                    }
                }
            }

            let items = node.as_list()?;
            match items.len() {
                17 => {
                    if key_index == nibbles.len() {
                        return match_value(&items[16], value);
                    }
                    let child = &items[usize::from(nibbles[key_index])];
                    key_index += 1;
                    expected = child_ref(child)?;
                }
                2 => {
                    let (path, is_leaf) = decode_hex_prefix(items[0].as_bytes()?)?;
                    let remaining = &nibbles[key_index..];
                    if !remaining.starts_with(&path) {
                        return Err(ProofError::KeyMismatch);
                    }
                    key_index += path.len();
                    if is_leaf {
                        if key_index != nibbles.len() {
                            return Err(ProofError::KeyMismatch);
                        }
                        return match_value(&items[1], value);
                    }
                    expected = child_ref(&items[1])?;
                }
                _ => return Err(ProofError::InvalidNode("trie node must have 2 or 17 items")),
            }
        }
        Err(ProofError::Incomplete)
    }
}

fn match_value(item: &RlpItem<'_>, value: &[u8]) -> Result<(), ProofError> {
    if item.as_bytes()? == value {
        Ok(())
    } else {
        Err(ProofError::ValueMismatch)
    }
}

fn child_ref<'a>(item: &RlpItem<'a>) -> Result<NodeRef<'a>, ProofError> {
    if item.is_list() {
        return Ok(NodeRef::Inline(item.raw));
    }
    let bytes = item.as_bytes()?;
    match bytes.len() {
        0 => Err(ProofError::KeyMismatch),
        32 => {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(bytes);
            Ok(NodeRef::Hash(hash))
        }
        _ => Err(ProofError::InvalidNode("child reference must be a hash or embedded node")),
    }
}

pub fn to_nibbles(bytes: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(bytes.len() * 2);
    for byte in bytes {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    nibbles
}

/// Decodes a hex-prefix encoded path into nibbles and the leaf flag.
pub fn decode_hex_prefix(encoded: &[u8]) -> Result<(Vec<u8>, bool), ProofError> {
    let first = *encoded
        .first()
        .ok_or(ProofError::InvalidNode("empty hex-prefix path"))?;
    let flag = first >> 4;
    if flag > 3 {
        return Err(ProofError::InvalidNode("invalid hex-prefix flag"));
    }
    let is_leaf = flag & 2 != 0;
    let odd = flag & 1 != 0;
    let mut nibbles = Vec::with_capacity(encoded.len() * 2);
    if odd {
        nibbles.push(first & 0x0f);
    } else if first & 0x0f != 0 {
        return Err(ProofError::InvalidNode("invalid hex-prefix padding"));
    }
    nibbles.extend(to_nibbles(&encoded[1..]));
    Ok((nibbles, is_leaf))
}

pub fn encode_hex_prefix(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
    let flag = if is_leaf { 2u8 } else { 0u8 };
    let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
    let rest = if nibbles.len() % 2 == 1 {
        out.push(((flag | 1) << 4) | nibbles[0]);
        &nibbles[1..]
    } else {
        out.push(flag << 4);
        nibbles
    };
    for pair in rest.chunks(2) {
        out.push((pair[0] << 4) | pair[1]);
    }
    out
}
