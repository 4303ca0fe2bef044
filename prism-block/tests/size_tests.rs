mod common;

use common::{fixture, map_block};
use prism_block::{Error, HASH_MULTIPLIER};

// Per-row overhead: one i32 offset + one null-flag byte.
const ROW_OVERHEAD: u64 = 5;
// Per-entry overhead: an 8-byte value + flag in each child column, plus the
// doubled hash slots charged whether or not the table is built.
const ENTRY_COST: u64 = (8 + 1) * 2 + 4 * HASH_MULTIPLIER as u64;

#[test]
fn region_size_is_monotonic_in_length() {
    let block = fixture();
    let mut previous = 0;
    for length in 0..=block.position_count() {
        let size = block.region_size_in_bytes(0, length).unwrap();
        assert!(size >= previous, "shrank at length {length}");
        previous = size;
    }
}

#[test]
fn region_size_charges_rows_entries_and_index_instance() {
    let block = fixture();
    let instance = block.hash_index().instance_size_in_bytes();
    assert_eq!(
        block.region_size_in_bytes(0, 3).unwrap(),
        3 * ROW_OVERHEAD + 3 * ENTRY_COST + instance
    );
    // The null row carries no entries, only its row overhead.
    assert_eq!(
        block.region_size_in_bytes(1, 1).unwrap(),
        ROW_OVERHEAD + instance
    );
}

#[test]
fn size_is_charged_as_if_built() {
    let block = fixture();
    let before = block.region_size_in_bytes(0, 3).unwrap();
    block.ensure_hash_index_loaded().unwrap();
    assert_eq!(block.region_size_in_bytes(0, 3).unwrap(), before);
}

#[test]
fn positions_size_matches_region_size_for_full_selection() {
    let block = fixture();
    assert_eq!(
        block.positions_size_in_bytes(&[true, true, true]).unwrap(),
        block.region_size_in_bytes(0, 3).unwrap()
    );
}

#[test]
fn positions_size_counts_only_selected_rows() {
    let block = fixture();
    let instance = block.hash_index().instance_size_in_bytes();
    assert_eq!(
        block.positions_size_in_bytes(&[false, true, false]).unwrap(),
        ROW_OVERHEAD + instance
    );
    assert_eq!(
        block.positions_size_in_bytes(&[true, false, true]).unwrap(),
        2 * ROW_OVERHEAD + 3 * ENTRY_COST + instance
    );
}

#[test]
fn positions_size_rejects_short_masks() {
    let block = fixture();
    assert!(matches!(
        block.positions_size_in_bytes(&[true, true]),
        Err(Error::InvalidArgumentError(_))
    ));
}

#[test]
fn stats_size_sums_entries_and_zeroes_nulls() {
    let block = fixture();
    assert_eq!(block.estimated_data_size_for_stats(0).unwrap(), 16);
    assert_eq!(block.estimated_data_size_for_stats(1).unwrap(), 0);
    assert_eq!(block.estimated_data_size_for_stats(2).unwrap(), 32);
}

#[test]
fn retained_size_includes_unbuilt_table() {
    let block = map_block(&[Some(vec![(1, 1), (2, 2)])]);
    let index = block.hash_index();
    assert_eq!(
        index.retained_size_in_bytes(),
        index.instance_size_in_bytes() + (2 * HASH_MULTIPLIER * 4) as u64
    );
}
