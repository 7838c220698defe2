mod common;

use common::{address, allocation_payload, ledger_tx, rejection, sample_asset, tuple, Harness, GUID};
use paydayd_assets::{Asset, ErrorKind};
use paydayd_consensus::constants::{
    ASSET_UPDATE_DATA, TX_VERSION_ASSET_ACTIVATE, TX_VERSION_ASSET_SEND,
    TX_VERSION_ASSET_TRANSFER, TX_VERSION_ASSET_UPDATE,
};
use paydayd_primitives::WitnessAddress;

fn update_record(owner: &WitnessAddress) -> Asset {
    Asset {
        balance: 0,
        public_data: Vec::new(),
        contract: Vec::new(),
        update_flags: 0,
        ..sample_asset(owner, 0, 0)
    }
}

#[test]
fn activate_send_transfer() {
    let mut h = Harness::new();
    let (a, b, c) = (address(0xa1), address(0xb2), address(0xc3));
    h.activate(&a, 1_000, 10_000);
    let asset = h.asset();
    assert_eq!(asset.total_supply, 1_000);
    assert_eq!(asset.balance, 1_000);
    assert_eq!(asset.owner, a);

    let send = h.payload_tx(
        TX_VERSION_ASSET_SEND,
        &a,
        &allocation_payload(&tuple(0xa1), &[(b.clone(), 400)]),
    );
    h.connect(&[send]).expect("asset send");
    assert_eq!(h.asset().balance, 600);
    assert_eq!(h.balance(&tuple(0xb2)), 400);

    let mut transfer = update_record(&a);
    transfer.transfer_to = c.clone();
    let coin = h.fund(&a);
    let tx = ledger_tx(TX_VERSION_ASSET_TRANSFER, &[coin], &transfer.to_bytes());
    h.connect(&[tx]).expect("transfer");
    let asset = h.asset();
    assert_eq!(asset.owner, c);
    assert!(asset.transfer_to.is_null());
    assert_eq!(asset.symbol, "SYM");
    assert_eq!(asset.precision, 8);

    let mut update = update_record(&b);
    update.balance = 10;
    let coin = h.fund(&b);
    let tx = ledger_tx(TX_VERSION_ASSET_UPDATE, &[coin], &update.to_bytes());
    let error = rejection(h.connect(&[tx]));
    assert_eq!(error.kind, ErrorKind::AuthorizationFailure);
}

#[test]
fn activation_rules() {
    let mut h = Harness::new();
    let owner = address(0xa1);
    h.activate(&owner, 1_000, 10_000);

    let again = h.activate_tx(&owner, 5, 10);
    let error = rejection(h.connect(&[again]));
    assert_eq!(error.code, 2041);

    let mut long_symbol = sample_asset(&owner, 1, 10);
    long_symbol.guid = GUID + 1;
    long_symbol.symbol = "TOOLONGSYM".to_string();
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_ACTIVATE, &[coin], &long_symbol.to_bytes());
    assert_eq!(rejection(h.connect(&[tx])).code, 2005);

    let mut over_max = sample_asset(&owner, 11, 10);
    over_max.guid = GUID + 2;
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_ACTIVATE, &[coin], &over_max.to_bytes());
    assert_eq!(rejection(h.connect(&[tx])).code, 2015);

    let mut unsigned = sample_asset(&owner, 1, 10);
    unsigned.guid = GUID + 3;
    let coin = h.fund(&address(0x99));
    let tx = ledger_tx(TX_VERSION_ASSET_ACTIVATE, &[coin], &unsigned.to_bytes());
    assert_eq!(
        rejection(h.connect(&[tx])).kind,
        ErrorKind::AuthorizationFailure
    );
}

#[test]
fn update_respects_flags_and_frozen_fields() {
    let mut h = Harness::new();
    let owner = address(0xa1);
    h.activate(&owner, 1_000, 2_000);

    let mut supply = update_record(&owner);
    supply.balance = 500;
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_UPDATE, &[coin], &supply.to_bytes());
    h.connect(&[tx]).expect("supply update");
    let asset = h.asset();
    assert_eq!(asset.total_supply, 1_500);
    assert_eq!(asset.balance, 1_500);

    let mut too_much = update_record(&owner);
    too_much.balance = 501;
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_UPDATE, &[coin], &too_much.to_bytes());
    let error = rejection(h.connect(&[tx]));
    assert_eq!(error.kind, ErrorKind::SupplyOverflow);
    assert_eq!(error.code, 2030);

    let mut precision = update_record(&owner);
    precision.precision = 4;
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_UPDATE, &[coin], &precision.to_bytes());
    assert_eq!(
        rejection(h.connect(&[tx])).kind,
        ErrorKind::FieldInvariantViolation
    );

    let mut restrict = update_record(&owner);
    restrict.update_flags = ASSET_UPDATE_DATA;
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_UPDATE, &[coin], &restrict.to_bytes());
    h.connect(&[tx]).expect("flag update");
    assert_eq!(h.asset().update_flags, ASSET_UPDATE_DATA);

    let mut data = update_record(&owner);
    data.public_data = b"new".to_vec();
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_UPDATE, &[coin], &data.to_bytes());
    h.connect(&[tx]).expect("data update");
    assert_eq!(h.asset().public_data, b"new".to_vec());

    let mut supply = update_record(&owner);
    supply.balance = 1;
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_UPDATE, &[coin], &supply.to_bytes());
    assert_eq!(rejection(h.connect(&[tx])).code, 2026);

    let mut flags = update_record(&owner);
    flags.update_flags = 31;
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_UPDATE, &[coin], &flags.to_bytes());
    assert_eq!(rejection(h.connect(&[tx])).code, 2040);
}

#[test]
fn transfer_cannot_change_frozen_fields() {
    let mut h = Harness::new();
    let (owner, heir) = (address(0xa1), address(0xe5));
    h.activate(&owner, 1_000, 2_000);

    let mut symbol = update_record(&owner);
    symbol.transfer_to = heir.clone();
    symbol.symbol = "NEW".to_string();
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_TRANSFER, &[coin], &symbol.to_bytes());
    assert_eq!(
        rejection(h.connect(&[tx])).kind,
        ErrorKind::FieldInvariantViolation
    );

    let mut precision = update_record(&owner);
    precision.transfer_to = heir.clone();
    precision.precision = 2;
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_TRANSFER, &[coin], &precision.to_bytes());
    assert_eq!(
        rejection(h.connect(&[tx])).kind,
        ErrorKind::FieldInvariantViolation
    );
    assert_eq!(h.asset().owner, owner);

    let mut transfer = update_record(&owner);
    transfer.transfer_to = heir.clone();
    let coin = h.fund(&owner);
    let tx = ledger_tx(TX_VERSION_ASSET_TRANSFER, &[coin], &transfer.to_bytes());
    h.connect(&[tx]).expect("transfer");
    let asset = h.asset();
    assert_eq!(asset.owner, heir);
    assert_eq!(asset.symbol, "SYM");
    assert_eq!(asset.precision, 8);
}

#[test]
fn issuer_send_limits() {
    let mut h = Harness::new();
    let owner = address(0xa1);
    h.activate(&owner, 100, 1_000);

    let overdraw = h.payload_tx(
        TX_VERSION_ASSET_SEND,
        &owner,
        &allocation_payload(&tuple(0xa1), &[(address(0xb2), 60), (address(0xc3), 41)]),
    );
    let error = rejection(h.connect(&[overdraw]));
    assert_eq!(error.kind, ErrorKind::InsufficientBalance);
    assert_eq!(error.code, 2033);

    let zero = h.payload_tx(
        TX_VERSION_ASSET_SEND,
        &owner,
        &allocation_payload(&tuple(0xa1), &[(address(0xb2), 0)]),
    );
    assert_eq!(rejection(h.connect(&[zero])).code, 2032);

    let empty = h.payload_tx(TX_VERSION_ASSET_SEND, &owner, &allocation_payload(&tuple(0xa1), &[]));
    assert_eq!(rejection(h.connect(&[empty])).code, 2020);

    let stranger = h.payload_tx(
        TX_VERSION_ASSET_SEND,
        &address(0xb2),
        &allocation_payload(&tuple(0xb2), &[(address(0xc3), 1)]),
    );
    assert_eq!(
        rejection(h.connect(&[stranger])).kind,
        ErrorKind::AuthorizationFailure
    );
    assert_eq!(h.asset().balance, 100);
}

#[test]
fn later_transactions_see_earlier_ones_in_the_same_block() {
    let mut h = Harness::new();
    let owner = address(0xa1);
    let activate = h.activate_tx(&owner, 500, 1_000);
    let send = h.payload_tx(
        TX_VERSION_ASSET_SEND,
        &owner,
        &allocation_payload(&tuple(0xa1), &[(address(0xb2), 200), (address(0xb2), 50)]),
    );
    h.connect(&[activate, send]).expect("activate and send");
    assert_eq!(h.asset().balance, 250);
    assert_eq!(h.balance(&tuple(0xb2)), 250);
}
