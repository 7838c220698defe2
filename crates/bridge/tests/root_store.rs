use std::sync::Arc;

use paydayd_bridge::{
    ExternalTxRoot, MintKey, MintKeyStore, MissingRange, SyncCursor, SyncHeights, TxRootStore,
};
use paydayd_storage::memory::MemoryStore;
use paydayd_storage::{KeyValueStore, WriteBatch};

fn block_hash(height: u32) -> [u8; 32] {
    let mut hash = [0u8; 32];
    hash[..4].copy_from_slice(&height.to_le_bytes());
    hash[31] = 0xbb;
    hash
}

fn chained_root(height: u32) -> ExternalTxRoot {
    ExternalTxRoot {
        block_hash: block_hash(height),
        prev_block_hash: block_hash(height.wrapping_sub(1)),
        tx_root: [0x11; 32],
        receipt_root: [0x22; 32],
    }
}

fn cursor_at(sync: u32) -> SyncCursor {
    let cursor = SyncCursor::new();
    cursor.set_heights(SyncHeights { sync, current: 0 });
    cursor
}

#[test]
fn flush_write_updates_current_height() {
    let store = Arc::new(MemoryStore::new());
    let roots = TxRootStore::new(Arc::clone(&store));
    let cursor = cursor_at(10);
    let batch: Vec<_> = (1..=5).map(|height| (height, chained_root(height))).collect();
    roots.flush_write(&batch, &cursor).expect("write");
    assert_eq!(cursor.heights().current, 5);
    assert_eq!(roots.get(3).expect("get"), Some(chained_root(3)));
    assert_eq!(roots.get(6).expect("get"), None);
}

#[test]
fn audit_reports_gaps_and_broken_links() {
    let store = Arc::new(MemoryStore::new());
    let roots = TxRootStore::new(Arc::clone(&store));
    let cursor = cursor_at(20);

    let mut entries: Vec<_> = [1u32, 2, 3, 4, 7, 8]
        .into_iter()
        .map(|height| (height, chained_root(height)))
        .collect();
    entries[3].1.prev_block_hash = [0xee; 32];
    roots.flush_write(&entries, &cursor).expect("write");

    let missing = roots.audit(&cursor).expect("audit");
    assert_eq!(
        missing,
        vec![MissingRange::new(0, 20), MissingRange::new(5, 6)]
    );
    assert_eq!(roots.get(4).expect("get"), None);
    assert!(roots.get(3).expect("get").is_some());
}

#[test]
fn audit_with_too_few_roots_requests_window() {
    let store = Arc::new(MemoryStore::new());
    let roots = TxRootStore::new(Arc::clone(&store));
    let cursor = cursor_at(50_000);
    assert_eq!(
        roots.audit(&cursor).expect("audit"),
        vec![MissingRange::new(10_000, 50_000)]
    );

    roots
        .flush_write(
            &[(20_000, chained_root(20_000)), (20_001, chained_root(20_001))],
            &cursor,
        )
        .expect("write");
    assert_eq!(
        roots.audit(&cursor).expect("audit"),
        vec![MissingRange::new(10_000, 19_999)]
    );
}

#[test]
fn prune_keeps_retention_window() {
    let store = Arc::new(MemoryStore::new());
    let roots = TxRootStore::new(Arc::clone(&store));
    let cursor = cursor_at(0);
    let heights = [10u32, 30_000, 30_001, 149_999, 150_001];
    let entries: Vec<_> = heights
        .into_iter()
        .map(|height| (height, chained_root(height)))
        .collect();
    roots.flush_write(&entries, &cursor).expect("write");

    cursor.set_heights(SyncHeights::default());
    roots.prune(50_000, &cursor).expect("prune below window");
    assert_eq!(roots.all().expect("all").len(), 5);

    roots.prune(150_000, &cursor).expect("prune");
    let kept: Vec<u32> = roots
        .all()
        .expect("all")
        .into_iter()
        .map(|(height, _)| height)
        .collect();
    assert_eq!(kept, vec![30_000, 30_001, 149_999]);
    assert_eq!(
        cursor.heights(),
        SyncHeights {
            sync: 150_000,
            current: 149_999
        }
    );

    let startup = SyncCursor::new();
    roots.prune(0, &startup).expect("startup scan");
    assert_eq!(startup.heights(), SyncHeights { sync: 0, current: 149_999 });
}

#[test]
fn mint_keys_round_trip_through_batches() {
    let store = Arc::new(MemoryStore::new());
    let mints = MintKeyStore::new(Arc::clone(&store));
    let key = MintKey::new(1_234_567, 3);
    assert!(!mints.contains(&key).expect("contains"));

    let mut batch = WriteBatch::new();
    mints.insert(&mut batch, &key);
    store.write_batch(&batch).expect("commit");
    assert!(mints.contains(&key).expect("contains"));
    assert_eq!(mints.all().expect("all"), vec![key]);

    let mut batch = WriteBatch::new();
    mints.delete(&mut batch, &key);
    store.write_batch(&batch).expect("commit");
    assert!(!mints.contains(&key).expect("contains"));
}
