//! Shared fixtures for map block tests.
#![allow(dead_code)] // each test binary uses its own subset

use std::sync::Arc;

use prism_block::{
    Block, BlockBuilder, Int64Block, Int64BlockBuilder, Int64KeyOps, MapBlock, MapBlockBuilder,
};

/// One map row: `None` is a null row, `Some(pairs)` holds its entries.
pub type Row = Option<Vec<(i64, i64)>>;

pub fn int64_map_builder() -> MapBlockBuilder {
    MapBlockBuilder::new(
        Box::new(Int64BlockBuilder::new()),
        Box::new(Int64BlockBuilder::new()),
        Arc::new(Int64KeyOps),
    )
}

pub fn map_block(rows: &[Row]) -> MapBlock {
    let mut builder = int64_map_builder();
    for row in rows {
        match row {
            None => builder.append_null(),
            Some(pairs) => builder
                .append_row(|keys, values| {
                    let keys = keys
                        .as_any_mut()
                        .downcast_mut::<Int64BlockBuilder>()
                        .unwrap();
                    let values = values
                        .as_any_mut()
                        .downcast_mut::<Int64BlockBuilder>()
                        .unwrap();
                    for &(k, v) in pairs {
                        keys.append_value(k);
                        values.append_value(v);
                    }
                    Ok(())
                })
                .unwrap(),
        }
    }
    builder.finish().unwrap()
}

pub fn row_pairs(block: &MapBlock, position: usize) -> Row {
    if block.is_null(position).unwrap() {
        return None;
    }
    let start = block.get_offset(position).unwrap();
    let entry_count = block.block(position).unwrap().entry_count();
    let keys = block.keys().as_any().downcast_ref::<Int64Block>().unwrap();
    let values = block
        .values()
        .as_any()
        .downcast_ref::<Int64Block>()
        .unwrap();
    Some(
        (0..entry_count)
            .map(|i| (keys.value(start + i), values.value(start + i)))
            .collect(),
    )
}

pub fn rows_of(block: &MapBlock) -> Vec<Row> {
    (0..block.position_count())
        .map(|p| row_pairs(block, p))
        .collect()
}

/// The canonical three-row fixture: `{10:1} | null | {20:2, 30:3}`, with
/// entry-based offsets `[0, 1, 1, 3]`.
pub fn fixture() -> MapBlock {
    map_block(&[Some(vec![(10, 1)]), None, Some(vec![(20, 2), (30, 3)])])
}
