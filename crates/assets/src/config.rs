use crate::zdag::ZdagPolicy;

/// Ledger options that do not affect consensus.
#[derive(Clone, Debug, Default)]
pub struct AssetConfig {
    /// Keep a txid history per asset and per allocation tuple.
    pub asset_index: bool,
    /// Restricts the history to these GUIDs; empty means all.
    pub asset_index_guids: Vec<u32>,
    pub zdag: ZdagPolicy,
}

impl AssetConfig {
    pub fn indexes(&self, guid: u32) -> bool {
        self.asset_index
            && (self.asset_index_guids.is_empty() || self.asset_index_guids.contains(&guid))
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BridgeSettings {
    /// The external node follows a test network; use the shallow
    /// confirmation depth.
    pub geth_testnet: bool,
    /// Roots are never required in lite mode.
    pub lite_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_filter() {
        let mut config = AssetConfig::default();
        assert!(!config.indexes(700));
        config.asset_index = true;
        assert!(config.indexes(700));
        config.asset_index_guids = vec![800];
        assert!(!config.indexes(700));
        assert!(config.indexes(800));
    }
}
