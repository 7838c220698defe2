use paydayd_consensus::constants::{
    TX_VERSION_ALLOCATION_BURN, TX_VERSION_ALLOCATION_LOCK, TX_VERSION_ALLOCATION_MINT,
    TX_VERSION_ALLOCATION_SEND, TX_VERSION_ASSET_ACTIVATE, TX_VERSION_ASSET_SEND,
    TX_VERSION_ASSET_TRANSFER, TX_VERSION_ASSET_UPDATE, TX_VERSION_MINT,
};

/// Ledger family of a transaction, derived from its version tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpClass {
    None,
    Asset,
    Allocation,
    Mint,
}

pub fn classify(version: i32) -> OpClass {
    match version {
        TX_VERSION_ASSET_ACTIVATE
        | TX_VERSION_ASSET_UPDATE
        | TX_VERSION_ASSET_TRANSFER
        | TX_VERSION_ASSET_SEND => OpClass::Asset,
        TX_VERSION_ALLOCATION_SEND | TX_VERSION_ALLOCATION_BURN | TX_VERSION_ALLOCATION_LOCK => {
            OpClass::Allocation
        }
        TX_VERSION_MINT | TX_VERSION_ALLOCATION_MINT => OpClass::Mint,
        _ => OpClass::None,
    }
}

pub fn is_ledger_tx(version: i32) -> bool {
    classify(version) != OpClass::None
}

/// Short operation name used in logs and status output.
pub fn op_name(version: i32) -> &'static str {
    match version {
        TX_VERSION_ASSET_ACTIVATE => "assetactivate",
        TX_VERSION_ASSET_UPDATE => "assetupdate",
        TX_VERSION_ASSET_TRANSFER => "assettransfer",
        TX_VERSION_ASSET_SEND => "assetsend",
        TX_VERSION_ALLOCATION_SEND => "assetallocationsend",
        TX_VERSION_ALLOCATION_BURN => "assetallocationburn",
        TX_VERSION_ALLOCATION_LOCK => "assetallocationlock",
        TX_VERSION_MINT => "paydaycoinmint",
        TX_VERSION_ALLOCATION_MINT => "assetallocationmint",
        _ => "unknown",
    }
}
