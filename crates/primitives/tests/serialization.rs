use paydayd_primitives::encoding::{DecodeError, Decoder, Encoder};
use paydayd_primitives::outpoint::OutPoint;
use paydayd_primitives::script::{op_return_script, witness_program_script};
use paydayd_primitives::transaction::{Transaction, TransactionDecodeError, TxIn, TxOut};
use paydayd_primitives::{hash_from_hex, hash_to_hex, sha256d, WitnessAddress};

fn seq_hash(start: u8) -> [u8; 32] {
    std::array::from_fn(|i| start.wrapping_add(i as u8))
}

fn sample_tx() -> Transaction {
    Transaction {
        version: 0x7407,
        vin: vec![TxIn {
            prevout: OutPoint::new(seq_hash(0x10), 3),
            script_sig: vec![0xaa, 0xbb],
            sequence: 0xffff_fffe,
        }],
        vout: vec![
            TxOut {
                value: 1_000,
                script_pubkey: witness_program_script(&WitnessAddress::new(0, vec![0x42; 20])),
            },
            TxOut {
                value: 0,
                script_pubkey: op_return_script(b"payload"),
            },
        ],
        lock_time: 7,
    }
}

#[test]
fn transaction_layout_is_fixed() {
    let tx = sample_tx();
    let encoded = tx.consensus_encode();

    let mut expected = Encoder::new();
    expected.write_i32_le(0x7407);
    expected.write_varint(1);
    expected.write_hash_le(&seq_hash(0x10));
    expected.write_u32_le(3);
    expected.write_var_bytes(&[0xaa, 0xbb]);
    expected.write_u32_le(0xffff_fffe);
    expected.write_varint(2);
    expected.write_i64_le(1_000);
    expected.write_var_bytes(&tx.vout[0].script_pubkey);
    expected.write_i64_le(0);
    expected.write_var_bytes(&tx.vout[1].script_pubkey);
    expected.write_u32_le(7);
    assert_eq!(encoded, expected.into_inner());

    assert_eq!(tx.txid(), sha256d(&encoded));
    let decoded = Transaction::consensus_decode(&encoded).expect("decode");
    assert_eq!(decoded, tx);
    assert_eq!(decoded.op_return_data(), Some(b"payload".to_vec()));
    assert_eq!(decoded.op_return_index(), Some(1));
}

#[test]
fn truncated_transactions_fail_cleanly() {
    let encoded = sample_tx().consensus_encode();
    for len in 0..encoded.len() {
        let result = Transaction::consensus_decode(&encoded[..len]);
        assert!(result.is_err(), "prefix of {len} bytes decoded");
    }
    let mut extended = encoded.clone();
    extended.push(0);
    assert!(matches!(
        Transaction::consensus_decode(&extended),
        Err(TransactionDecodeError::Decode(DecodeError::TrailingBytes))
    ));
}

#[test]
fn coinbase_detection() {
    let mut tx = sample_tx();
    assert!(!tx.is_coinbase());
    tx.vin = vec![TxIn::spending(OutPoint::null())];
    assert!(tx.is_coinbase());
    tx.vin.push(TxIn::spending(OutPoint::new(seq_hash(1), 0)));
    assert!(!tx.is_coinbase());
}

#[test]
fn hash_hex_is_byte_reversed() {
    let hash = seq_hash(0);
    let text = hash_to_hex(&hash);
    assert!(text.starts_with("1f1e1d"));
    assert_eq!(hash_from_hex(&text), Some(hash));
    assert_eq!(hash_from_hex("00"), None);
}

#[test]
fn oversized_counts_are_rejected() {
    let mut encoder = Encoder::new();
    encoder.write_i32_le(1);
    encoder.write_u8(0xff);
    encoder.write_u64_le(u64::MAX);
    let bytes = encoder.into_inner();
    let mut decoder = Decoder::new(&bytes[4..]);
    assert_eq!(decoder.read_varint(), Err(DecodeError::SizeTooLarge));
    assert!(Transaction::consensus_decode(&bytes).is_err());
}
