/// Context a ledger transaction is validated in.
///
/// Replaces independent "just check", "sanity" and "miner" switches with the
/// combinations that actually occur.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationMode {
    /// Mempool acceptance; updates the zdag overlay.
    Mempool,
    /// Mempool-style dry run without overlay side effects.
    Sanity,
    /// Connecting a block to the active chain; the only mode that persists.
    Connect,
    /// Checking a block without connecting it.
    BlockCheck,
    /// Assembling a block template; failures exclude the transaction.
    Miner,
}

impl ValidationMode {
    /// Validated against the persisted store plus the mempool overlay rather
    /// than a block delta.
    pub fn is_mempool(self) -> bool {
        matches!(self, ValidationMode::Mempool | ValidationMode::Sanity)
    }

    pub fn is_sanity(self) -> bool {
        matches!(self, ValidationMode::Sanity | ValidationMode::BlockCheck)
    }

    pub fn is_miner(self) -> bool {
        matches!(self, ValidationMode::Miner)
    }

    /// Block paths that apply lock changes and overlay resets.
    pub fn applies_block_effects(self) -> bool {
        matches!(self, ValidationMode::Connect | ValidationMode::Miner)
    }

    pub fn writes_state(self) -> bool {
        matches!(self, ValidationMode::Connect)
    }

    pub fn touches_overlay(self) -> bool {
        matches!(self, ValidationMode::Mempool)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationMode::Mempool => "mempool",
            ValidationMode::Sanity => "sanity",
            ValidationMode::Connect => "connect",
            ValidationMode::BlockCheck => "blockcheck",
            ValidationMode::Miner => "miner",
        }
    }
}
