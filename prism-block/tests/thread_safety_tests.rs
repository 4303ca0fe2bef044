mod common;

use std::sync::Arc;
use std::thread;

use common::{Row, map_block};
use prism_block::{BlockRef, Int64Probe, MapBlock, SingleMapBlock};

/// Compile-time proof that the container types cross thread boundaries.
#[test]
fn blocks_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<MapBlock>();
    assert_send_sync::<SingleMapBlock>();
    assert_send_sync::<BlockRef>();
}

fn wide_block(rows: usize, entries_per_row: usize) -> MapBlock {
    let rows: Vec<Row> = (0..rows)
        .map(|r| {
            Some(
                (0..entries_per_row)
                    .map(|e| ((r * entries_per_row + e) as i64, r as i64))
                    .collect(),
            )
        })
        .collect();
    map_block(&rows)
}

/// Many threads racing to trigger the lazy build against one shared block.
/// Whichever build publishes first, every thread must observe a fully-formed
/// table and identical lookup results.
#[test]
fn concurrent_lazy_build_is_race_free() {
    const THREADS: usize = 8;
    const ROWS: usize = 64;
    const ENTRIES: usize = 4;

    let block = Arc::new(wide_block(ROWS, ENTRIES));
    assert!(!block.hash_index().is_present());

    let mut handles = Vec::new();
    for tid in 0..THREADS {
        let block = Arc::clone(&block);
        handles.push(thread::spawn(move || {
            for position in 0..ROWS {
                let row = block.block(position).unwrap();
                for e in 0..ENTRIES {
                    let key = (position * ENTRIES + e) as i64;
                    let slot = row.seek_key(&Int64Probe(key)).unwrap();
                    assert!(slot.is_some(), "thread {tid}: key {key} missing");
                }
                assert_eq!(row.seek_key(&Int64Probe(-1)).unwrap(), None);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(block.hash_index().is_present());
}

/// Zero-copy views taken on worker threads keep reading the shared buffers
/// while other threads look keys up through the shared index.
#[test]
fn views_and_lookups_interleave_across_threads() {
    const ROWS: usize = 32;
    let block = Arc::new(wide_block(ROWS, 2));

    let mut handles = Vec::new();
    for start in 0..4 {
        let block = Arc::clone(&block);
        handles.push(thread::spawn(move || {
            let view = block.region(start, ROWS - start).unwrap();
            let mut seen = 0u64;
            for position in 0..view.position_count() {
                let row = view.block(position).unwrap();
                let key = ((start + position) * 2) as i64;
                if row.seek_key(&Int64Probe(key)).unwrap().is_some() {
                    seen += 1;
                }
            }
            seen
        }));
    }
    for handle in handles {
        let seen = handle.join().unwrap();
        assert!(seen > 0);
    }
}
