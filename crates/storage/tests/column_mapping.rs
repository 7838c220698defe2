use paydayd_storage::{Column, WriteBatch};

#[test]
fn column_index_and_bit_are_stable() {
    let mut seen = 0u32;
    for (idx, column) in Column::ALL.iter().copied().enumerate() {
        assert_eq!(column.index(), idx);
        let bit = column.bit();
        assert_eq!(bit, 1u32 << idx);
        assert_eq!(bit.count_ones(), 1);
        assert_eq!(seen & bit, 0, "duplicate bit for {column:?}");
        seen |= bit;
    }
    assert_eq!(seen.count_ones() as usize, Column::ALL.len());
}

#[test]
fn column_names_are_unique() {
    let mut names: Vec<&str> = Column::ALL.iter().map(|column| column.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), Column::ALL.len());
}

#[test]
fn batch_counts_ops_per_column() {
    let mut batch = WriteBatch::new();
    batch.put(Column::Asset, [1u8; 4], b"a".as_slice());
    batch.delete(Column::Asset, [2u8; 4]);
    batch.put(Column::LockedOutpoint, [3u8; 36], [1u8]);
    let counts = batch.column_counts();
    assert_eq!(counts[Column::Asset.index()], 2);
    assert_eq!(counts[Column::LockedOutpoint.index()], 1);
    assert_eq!(counts[Column::Meta.index()], 0);
    assert_eq!(batch.len(), 3);
}
