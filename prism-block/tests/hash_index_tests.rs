mod common;

use std::sync::Arc;

use common::fixture;
use prism_block::{
    Block, BlockBuilder, BytesBlockBuilder, BytesKeyOps, BytesProbe, Int64Block,
    Int64BlockBuilder, Int64Probe, MapBlockBuilder,
};

#[test]
fn index_is_absent_until_first_lookup_then_present_forever() {
    let block = fixture();
    assert!(!block.hash_index().is_present());

    let row = block.block(2).unwrap();
    let slot = row.seek_key(&Int64Probe(30)).unwrap();
    assert!(slot.is_some());
    assert!(block.hash_index().is_present());

    // Repeated lookups return identical results against the published table.
    for _ in 0..3 {
        assert_eq!(row.seek_key(&Int64Probe(30)).unwrap(), slot);
        assert_eq!(row.seek_key(&Int64Probe(31)).unwrap(), None);
    }
    assert!(block.hash_index().is_present());
}

#[test]
fn seek_resolves_every_key_to_its_value() {
    let block = fixture();
    let values = block
        .values()
        .as_any()
        .downcast_ref::<Int64Block>()
        .unwrap();
    for (position, pairs) in [(0, vec![(10, 1)]), (2, vec![(20, 2), (30, 3)])] {
        let row = block.block(position).unwrap();
        for (key, value) in pairs {
            let slot = row.seek_key(&Int64Probe(key)).unwrap().unwrap();
            assert_eq!(slot % 2, 1);
            assert_eq!(values.value(row.absolute_entry(slot)), value);
        }
    }
}

#[test]
fn seek_on_null_row_misses_without_building() {
    let block = fixture();
    let row = block.block(1).unwrap();
    assert_eq!(row.seek_key(&Int64Probe(10)).unwrap(), None);
    assert!(!block.hash_index().is_present());
}

#[test]
fn views_share_one_index() {
    let block = fixture();
    let view = block.region(1, 2).unwrap();

    // Building through a view publishes for every holder of the block.
    let row = view.block(1).unwrap();
    assert_eq!(row.seek_key(&Int64Probe(20)).unwrap(), Some(1));
    assert!(block.hash_index().is_present());
    assert!(view.hash_index().is_present());

    let row = block.block(0).unwrap();
    assert!(row.seek_key(&Int64Probe(10)).unwrap().is_some());
}

#[test]
fn copy_region_seeds_the_copy_when_source_is_built() {
    let block = fixture();
    block.ensure_hash_index_loaded().unwrap();

    let copy = block.copy_region(1, 2).unwrap();
    assert!(copy.hash_index().is_present());
    let row = copy.block(1).unwrap();
    let slot = row.seek_key(&Int64Probe(30)).unwrap().unwrap();
    assert_eq!(row.absolute_entry(slot), 1);
}

#[test]
fn copy_region_before_build_starts_absent() {
    let block = fixture();
    let copy = block.copy_region(0, 3).unwrap();
    assert!(!copy.hash_index().is_present());

    // The copy still builds lazily on its own, detached from the source.
    let row = copy.block(2).unwrap();
    assert!(row.seek_key(&Int64Probe(20)).unwrap().is_some());
    assert!(copy.hash_index().is_present());
    assert!(!block.hash_index().is_present());
}

#[test]
fn gather_carries_per_row_segments() {
    let block = fixture();
    block.ensure_hash_index_loaded().unwrap();

    let gathered = block.copy_positions(&[2, 0, 2], 0, 3).unwrap();
    assert!(gathered.hash_index().is_present());
    for position in [0, 2] {
        let row = gathered.block(position).unwrap();
        assert!(row.seek_key(&Int64Probe(20)).unwrap().is_some());
        assert!(row.seek_key(&Int64Probe(30)).unwrap().is_some());
        assert_eq!(row.seek_key(&Int64Probe(10)).unwrap(), None);
    }
    let row = gathered.block(1).unwrap();
    assert!(row.seek_key(&Int64Probe(10)).unwrap().is_some());
}

#[test]
fn single_value_block_carries_its_segment() {
    let block = fixture();
    block.ensure_hash_index_loaded().unwrap();

    let row_block = block.single_value_block(2).unwrap();
    assert!(row_block.hash_index().is_present());
    let row = row_block.block(0).unwrap();
    let slot = row.seek_key(&Int64Probe(30)).unwrap().unwrap();
    assert_eq!(row.absolute_entry(slot), 1);
}

#[test]
fn bytes_keys_seek_through_injected_ops() {
    let mut builder = MapBlockBuilder::new(
        Box::new(BytesBlockBuilder::new()),
        Box::new(Int64BlockBuilder::new()),
        Arc::new(BytesKeyOps),
    );
    builder
        .append_row(|keys, values| {
            let keys = keys.as_any_mut().downcast_mut::<BytesBlockBuilder>().unwrap();
            let values = values
                .as_any_mut()
                .downcast_mut::<Int64BlockBuilder>()
                .unwrap();
            for (k, v) in [(b"alpha".as_slice(), 1), (b"beta", 2), (b"gamma", 3)] {
                keys.append_value(k);
                values.append_value(v);
            }
            Ok(())
        })
        .unwrap();
    let block = builder.finish().unwrap();

    let row = block.block(0).unwrap();
    let values = block
        .values()
        .as_any()
        .downcast_ref::<Int64Block>()
        .unwrap();
    for (key, expected) in [(b"alpha".as_slice(), 1), (b"beta", 2), (b"gamma", 3)] {
        let slot = row.seek_key(&BytesProbe(key)).unwrap().unwrap();
        assert_eq!(values.value(row.absolute_entry(slot)), expected);
    }
    assert_eq!(row.seek_key(&BytesProbe(b"delta")).unwrap(), None);
}
