use std::fmt;

use paydayd_consensus::constants::BURN_SINK_PROGRAM;

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use crate::script::{MAX_WITNESS_PROGRAM_LEN, MIN_WITNESS_PROGRAM_LEN};

/// Versioned witness program used as the owner identity of assets and
/// allocations. An empty program is the null address.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct WitnessAddress {
    pub version: u8,
    pub program: Vec<u8>,
}

impl WitnessAddress {
    pub fn new(version: u8, program: Vec<u8>) -> Self {
        Self { version, program }
    }

    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.program.is_empty()
    }

    /// Synthetic sink credited by allocation burns.
    pub fn burn() -> Self {
        Self::new(0, BURN_SINK_PROGRAM.to_vec())
    }

    pub fn is_valid(&self) -> bool {
        self.version <= 16
            && (MIN_WITNESS_PROGRAM_LEN..=MAX_WITNESS_PROGRAM_LEN).contains(&self.program.len())
    }

    /// Parses the `vvhex` text form produced by `Display`.
    pub fn parse(input: &str) -> Option<Self> {
        let bytes = hex::decode(input.trim()).ok()?;
        let (version, program) = bytes.split_first()?;
        let address = Self::new(*version, program.to_vec());
        address.is_valid().then_some(address)
    }
}

impl fmt::Display for WitnessAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{}", self.version, hex::encode(&self.program))
    }
}

impl Encodable for WitnessAddress {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_u8(self.version);
        encoder.write_var_bytes(&self.program);
    }
}

impl Decodable for WitnessAddress {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let version = decoder.read_u8()?;
        let program = decoder.read_var_bytes_max(MAX_WITNESS_PROGRAM_LEN)?;
        Ok(Self { version, program })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_form_round_trips() {
        let address = WitnessAddress::new(0, vec![0xab; 20]);
        let text = address.to_string();
        assert!(text.starts_with("00abab"));
        assert_eq!(WitnessAddress::parse(&text), Some(address));
        assert_eq!(WitnessAddress::parse("00ab"), None);
    }

    #[test]
    fn burn_sink_is_a_valid_address() {
        assert!(WitnessAddress::burn().is_valid());
        assert!(!WitnessAddress::null().is_valid());
        assert!(WitnessAddress::null().is_null());
    }
}
