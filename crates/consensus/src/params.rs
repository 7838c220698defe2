//! Per-network consensus parameters for the asset ledger and bridge.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "main",
            Network::Testnet => "test",
            Network::Regtest => "regtest",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BridgeParams {
    /// External contract that receives base-coin burns.
    pub coin_contract: [u8; 20],
    /// Four-byte selector of the burn method on bridge contracts.
    pub burn_selector: [u8; 4],
    /// The bridge accepts mints only above this height.
    pub start_height: u32,
    /// External confirmations required before a burn may be minted.
    pub confirmations: u32,
    /// Confirmation depth used against an external test network.
    pub test_confirmations: u32,
}

#[derive(Clone, Debug)]
pub struct ConsensusParams {
    pub network: Network,
    pub bridge: BridgeParams,
}

impl ConsensusParams {
    pub fn bridge_enabled(&self, height: u32) -> bool {
        height > self.bridge.start_height
    }
}

#[derive(Debug)]
pub enum HexError {
    InvalidLength,
    InvalidHex,
}

impl std::fmt::Display for HexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HexError::InvalidLength => write!(f, "invalid hex length"),
            HexError::InvalidHex => write!(f, "invalid hex digit"),
        }
    }
}

impl std::error::Error for HexError {}

pub fn fixed_from_hex<const N: usize>(input: &str) -> Result<[u8; N], HexError> {
    let trimmed = input.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(hex).map_err(|err| match err {
        hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
            HexError::InvalidLength
        }
        hex::FromHexError::InvalidHexCharacter { .. } => HexError::InvalidHex,
    })?;
    bytes.try_into().map_err(|_| HexError::InvalidLength)
}

pub fn consensus_params(network: Network) -> ConsensusParams {
    match network {
        Network::Mainnet => mainnet_consensus_params(),
        Network::Testnet => testnet_consensus_params(),
        Network::Regtest => regtest_consensus_params(),
    }
}

const BURN_SELECTOR: [u8; 4] = [0x28, 0x5c, 0x5b, 0xc6];

fn mainnet_consensus_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Mainnet,
        bridge: BridgeParams {
            coin_contract: [
                0x19, 0x7a, 0x2f, 0x58, 0xc9, 0x4e, 0xff, 0x4b, 0x2c, 0x6a, 0xe0, 0x92, 0x2f, 0xbc,
                0x84, 0x00, 0x80, 0xf8, 0x39, 0xc2,
            ],
            burn_selector: BURN_SELECTOR,
            start_height: 75_000,
            confirmations: 240,
            test_confirmations: 10,
        },
    }
}

fn testnet_consensus_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Testnet,
        bridge: BridgeParams {
            coin_contract: [
                0x46, 0xc6, 0xac, 0xcc, 0x79, 0x0e, 0xbd, 0x00, 0x2c, 0x02, 0x20, 0x57, 0xa1, 0x4a,
                0x7d, 0x24, 0x7d, 0x5e, 0x5d, 0x37,
            ],
            burn_selector: BURN_SELECTOR,
            start_height: 100,
            confirmations: 240,
            test_confirmations: 10,
        },
    }
}

fn regtest_consensus_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Regtest,
        bridge: BridgeParams {
            coin_contract: [
                0x5f, 0x6e, 0x74, 0xba, 0x20, 0xbf, 0x26, 0x16, 0x16, 0x12, 0xea, 0xc8, 0xf7, 0xe8,
                0xb3, 0xb6, 0xc9, 0xba, 0xaa, 0xdd,
            ],
            burn_selector: BURN_SELECTOR,
            start_height: 100,
            confirmations: 240,
            test_confirmations: 10,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contracts_match_hex() {
        let main: [u8; 20] =
            fixed_from_hex("197a2f58c94eff4b2c6ae0922fbc840080f839c2").expect("hex");
        assert_eq!(consensus_params(Network::Mainnet).bridge.coin_contract, main);
        let test: [u8; 20] =
            fixed_from_hex("0x46c6accc790ebd002c022057a14a7d247d5e5d37").expect("hex");
        assert_eq!(consensus_params(Network::Testnet).bridge.coin_contract, test);
        let reg: [u8; 20] =
            fixed_from_hex("5f6e74ba20bf26161612eac8f7e8b3b6c9baaadd").expect("hex");
        assert_eq!(consensus_params(Network::Regtest).bridge.coin_contract, reg);
        let selector: [u8; 4] = fixed_from_hex("285c5bc6").expect("hex");
        assert_eq!(BURN_SELECTOR, selector);
    }

    #[test]
    fn bridge_start_is_exclusive() {
        let params = consensus_params(Network::Mainnet);
        assert!(!params.bridge_enabled(75_000));
        assert!(params.bridge_enabled(75_001));
        assert!(consensus_params(Network::Regtest).bridge_enabled(101));
    }

    #[test]
    fn fixed_from_hex_rejects_bad_input() {
        assert!(matches!(fixed_from_hex::<4>("abc"), Err(HexError::InvalidLength)));
        assert!(matches!(fixed_from_hex::<2>("zzzz"), Err(HexError::InvalidHex)));
        assert!(matches!(fixed_from_hex::<2>("aabbcc"), Err(HexError::InvalidLength)));
    }
}
