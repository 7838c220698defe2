mod common;

use common::{address, allocation_payload, ledger_tx, rejection, tuple, Harness, GUID};
use paydayd_assets::{AllocationTuple, ErrorKind};
use paydayd_consensus::constants::{
    TX_VERSION_ALLOCATION_LOCK, TX_VERSION_ALLOCATION_SEND, TX_VERSION_ASSET_SEND,
};
use paydayd_primitives::{OutPoint, Transaction, TxIn, TxOut};

/// Asset owned by 0xa1 with 500 allocated to 0xb2.
fn funded() -> Harness {
    let mut h = Harness::new();
    let owner = address(0xa1);
    h.activate(&owner, 1_000, 10_000);
    let send = h.payload_tx(
        TX_VERSION_ASSET_SEND,
        &owner,
        &allocation_payload(&tuple(0xa1), &[(address(0xb2), 500)]),
    );
    h.connect(&[send]).expect("fund allocation");
    h
}

#[test]
fn sends_move_balances() {
    let mut h = funded();
    let send = h.payload_tx(
        TX_VERSION_ALLOCATION_SEND,
        &address(0xb2),
        &allocation_payload(&tuple(0xb2), &[(address(0xc3), 120), (address(0xd4), 80)]),
    );
    h.connect(&[send]).expect("allocation send");
    assert_eq!(h.balance(&tuple(0xb2)), 300);
    assert_eq!(h.balance(&tuple(0xc3)), 120);
    assert_eq!(h.balance(&tuple(0xd4)), 80);

    let drain = h.payload_tx(
        TX_VERSION_ALLOCATION_SEND,
        &address(0xc3),
        &allocation_payload(&tuple(0xc3), &[(address(0xd4), 120)]),
    );
    h.connect(&[drain]).expect("drain");
    assert_eq!(h.balance(&tuple(0xc3)), 0);
    assert_eq!(h.balance(&tuple(0xd4)), 200);
}

#[test]
fn send_rules() {
    let mut h = funded();
    let sender = address(0xb2);

    let to_self = h.payload_tx(
        TX_VERSION_ALLOCATION_SEND,
        &sender,
        &allocation_payload(&tuple(0xb2), &[(sender.clone(), 10)]),
    );
    assert_eq!(rejection(h.connect(&[to_self])).code, 1022);

    let zero = h.payload_tx(
        TX_VERSION_ALLOCATION_SEND,
        &sender,
        &allocation_payload(&tuple(0xb2), &[(address(0xc3), 0)]),
    );
    assert_eq!(rejection(h.connect(&[zero])).code, 1020);

    let too_much = h.payload_tx(
        TX_VERSION_ALLOCATION_SEND,
        &sender,
        &allocation_payload(&tuple(0xb2), &[(address(0xc3), 501)]),
    );
    let error = rejection(h.connect(&[too_much]));
    assert_eq!(error.kind, ErrorKind::InsufficientBalance);
    assert_eq!(error.code, 1021);

    let none = h.payload_tx(TX_VERSION_ALLOCATION_SEND, &sender, &allocation_payload(&tuple(0xb2), &[]));
    assert_eq!(rejection(h.connect(&[none])).code, 1004);

    let unknown = h.payload_tx(
        TX_VERSION_ALLOCATION_SEND,
        &address(0xee),
        &allocation_payload(&tuple(0xee), &[(address(0xc3), 1)]),
    );
    assert_eq!(
        rejection(h.connect(&[unknown])).kind,
        ErrorKind::UnknownAllocation
    );

    let forged = h.payload_tx(
        TX_VERSION_ALLOCATION_SEND,
        &address(0xc3),
        &allocation_payload(&tuple(0xb2), &[(address(0xc3), 10)]),
    );
    assert_eq!(
        rejection(h.connect(&[forged])).kind,
        ErrorKind::AuthorizationFailure
    );

    assert_eq!(h.balance(&tuple(0xb2)), 500);
    assert_eq!(h.balance(&tuple(0xc3)), 0);
}

#[test]
fn burn_credits_the_sink() {
    let mut h = funded();
    let burn = h.burn_tx(&tuple(0xb2), 150);
    h.connect(&[burn]).expect("burn");
    assert_eq!(h.balance(&tuple(0xb2)), 350);
    assert_eq!(h.balance(&AllocationTuple::burn_sink(GUID)), 150);

    let overdraw = h.burn_tx(&tuple(0xb2), 351);
    let error = rejection(h.connect(&[overdraw]));
    assert_eq!(error.kind, ErrorKind::InsufficientBalance);
    assert_eq!(error.code, 1016);

    let zero = h.burn_tx(&tuple(0xb2), 0);
    assert_eq!(rejection(h.connect(&[zero])).code, 2029);
}

fn lock_tx(h: &mut Harness, sender: u8, outpoint: &OutPoint) -> Transaction {
    let mut payload = allocation_payload(&tuple(sender), &[]);
    payload.locked_outpoint = outpoint.clone();
    h.payload_tx(TX_VERSION_ALLOCATION_LOCK, &address(sender), &payload)
}

#[test]
fn locked_outpoint_guards_spends() {
    let mut h = funded();
    let owner = address(0xb2);
    let locked = h.fund(&owner);
    let lock = lock_tx(&mut h, 0xb2, &locked);
    h.connect(&[lock]).expect("lock");

    let allocation = h
        .engine()
        .get_asset_allocation(&tuple(0xb2))
        .expect("read")
        .expect("allocation");
    assert_eq!(allocation.locked_outpoint, locked);
    assert!(h.engine().stores().is_outpoint_locked(&locked).expect("read lock"));

    let plain = Transaction {
        version: 2,
        vin: vec![TxIn::spending(locked.clone())],
        vout: vec![TxOut {
            value: 9_000,
            script_pubkey: Vec::new(),
        }],
        lock_time: 0,
    };
    let error = rejection(h.driver.check_transaction(&plain, &h.coins, true));
    assert_eq!(error.code, 1024);

    let elsewhere = h.payload_tx(
        TX_VERSION_ALLOCATION_SEND,
        &owner,
        &allocation_payload(&tuple(0xb2), &[(address(0xc3), 10)]),
    );
    let error = rejection(h.driver.check_transaction(&elsewhere, &h.coins, true));
    assert_eq!(error.code, 1025);
    let error = rejection(h.connect(&[elsewhere]));
    assert_eq!(error.code, 1015);

    let spend = ledger_tx(
        TX_VERSION_ALLOCATION_SEND,
        &[locked.clone()],
        &allocation_payload(&tuple(0xb2), &[(address(0xc3), 10)]).to_bytes(),
    );
    h.driver
        .check_transaction(&spend, &h.coins, true)
        .expect("spending the lock is allowed");
    h.connect(&[spend]).expect("send through lock");

    let allocation = h
        .engine()
        .get_asset_allocation(&tuple(0xb2))
        .expect("read")
        .expect("allocation");
    assert!(allocation.locked_outpoint.is_null());
    assert_eq!(allocation.balance, 490);
    assert!(!h.engine().stores().is_outpoint_locked(&locked).expect("read lock"));
}

#[test]
fn another_allocation_cannot_spend_a_lock() {
    let mut h = funded();
    let share = h.payload_tx(
        TX_VERSION_ALLOCATION_SEND,
        &address(0xb2),
        &allocation_payload(&tuple(0xb2), &[(address(0xc3), 100)]),
    );
    h.connect(&[share]).expect("fund 0xc3");
    let locked = h.fund(&address(0xb2));
    let lock = lock_tx(&mut h, 0xb2, &locked);
    h.connect(&[lock]).expect("lock");

    let own_coin = h.fund(&address(0xc3));
    let theft = ledger_tx(
        TX_VERSION_ALLOCATION_SEND,
        &[own_coin, locked.clone()],
        &allocation_payload(&tuple(0xc3), &[(address(0xd4), 10)]).to_bytes(),
    );
    let error = rejection(h.driver.check_transaction(&theft, &h.coins, true));
    assert_eq!(error.code, 1025);
    let error = rejection(h.connect(std::slice::from_ref(&theft)));
    assert_eq!(error.code, 1025);

    assert!(h.engine().stores().is_outpoint_locked(&locked).expect("read lock"));
    assert_eq!(h.balance(&tuple(0xc3)), 100);
    assert_eq!(h.balance(&tuple(0xd4)), 0);
}

#[test]
fn lock_made_earlier_in_the_block_is_guarded() {
    let mut h = funded();
    let share = h.payload_tx(
        TX_VERSION_ALLOCATION_SEND,
        &address(0xb2),
        &allocation_payload(&tuple(0xb2), &[(address(0xc3), 100)]),
    );
    h.connect(&[share]).expect("fund 0xc3");
    let locked = h.fund(&address(0xb2));
    let lock = lock_tx(&mut h, 0xb2, &locked);
    let own_coin = h.fund(&address(0xc3));
    let theft = ledger_tx(
        TX_VERSION_ALLOCATION_SEND,
        &[own_coin, locked.clone()],
        &allocation_payload(&tuple(0xc3), &[(address(0xd4), 10)]).to_bytes(),
    );

    let error = rejection(h.connect(&[lock, theft]));
    assert_eq!(error.code, 1025);
    assert!(!h.engine().stores().is_outpoint_locked(&locked).expect("read lock"));
}

#[test]
fn relocking_releases_the_previous_outpoint() {
    let mut h = funded();
    let owner = address(0xb2);
    let first = h.fund(&owner);
    let second = h.fund(&owner);
    let lock = lock_tx(&mut h, 0xb2, &first);
    h.connect(&[lock]).expect("first lock");
    let relock = lock_tx(&mut h, 0xb2, &second);
    h.connect(&[relock]).expect("second lock");

    let stores = h.engine().stores();
    assert!(!stores.is_outpoint_locked(&first).expect("read lock"));
    assert!(stores.is_outpoint_locked(&second).expect("read lock"));
}

#[test]
fn lock_requires_an_outpoint() {
    let mut h = funded();
    let lock = lock_tx(&mut h, 0xb2, &OutPoint::null());
    assert_eq!(rejection(h.connect(&[lock])).code, 1004);
}
