//! Incremental producer of map blocks.

use std::sync::Arc;

use arrow::array::builder::NullBufferBuilder;
use arrow::buffer::ScalarBuffer;
use prism_result::{Error, Result};

use crate::block::BlockBuilder;
use crate::map::core::MapBlock;
use crate::map::key_ops::MapKeyOps;

/// Builds a [`MapBlock`] one row at a time over a pair of child builders.
///
/// The builder owns the structural invariants of the blocks it finishes:
/// offsets grow monotonically, every null row is empty, and the key and
/// value columns stay entry-for-entry parallel. A finished block is valid by
/// construction and its readers perform only range checks.
///
/// Builders are single-writer. The finished block's hash index starts
/// absent and needs no synchronization until the block is shared.
pub struct MapBlockBuilder {
    offsets: Vec<i32>,
    nulls: NullBufferBuilder,
    keys: Box<dyn BlockBuilder>,
    values: Box<dyn BlockBuilder>,
    key_ops: Arc<dyn MapKeyOps>,
}

impl MapBlockBuilder {
    pub fn new(
        keys: Box<dyn BlockBuilder>,
        values: Box<dyn BlockBuilder>,
        key_ops: Arc<dyn MapKeyOps>,
    ) -> Self {
        Self {
            offsets: vec![0],
            nulls: NullBufferBuilder::new(0),
            keys,
            values,
            key_ops,
        }
    }

    /// Append one map row. The closure receives the key and value builders
    /// and appends one entry to each per key-value pair; keys within the row
    /// must be pairwise distinct (producer contract, not validated here).
    ///
    /// If the closure fails, or leaves the key and value columns with
    /// diverged entry counts, the builder is poisoned and must be discarded.
    pub fn append_row<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn BlockBuilder, &mut dyn BlockBuilder) -> Result<()>,
    {
        f(self.keys.as_mut(), self.values.as_mut())?;
        if self.keys.len() != self.values.len() {
            return Err(Error::InvariantViolation(format!(
                "row left {} key entries but {} value entries",
                self.keys.len(),
                self.values.len()
            )));
        }
        self.offsets.push(entry_offset(self.keys.len())?);
        self.nulls.append_non_null();
        Ok(())
    }

    /// Append a null row. Null rows hold zero entries.
    pub fn append_null(&mut self) {
        self.offsets.push(self.offsets[self.offsets.len() - 1]);
        self.nulls.append_null();
    }

    /// Append row `position` of another map block, null or not.
    pub fn append_from_map(&mut self, source: &MapBlock, position: usize) -> Result<()> {
        if source.is_null(position)? {
            self.append_null();
            return Ok(());
        }
        let start = source.get_offset(position)?;
        let end = source.offset_at(position + 1);
        self.append_row(|keys, values| {
            for entry in start..end {
                keys.append_from(source.keys().as_ref(), entry)?;
                values.append_from(source.values().as_ref(), entry)?;
            }
            Ok(())
        })
    }

    /// Rows appended so far.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish the block and reset the builder to empty.
    pub fn finish(&mut self) -> Result<MapBlock> {
        let offsets = ScalarBuffer::from(std::mem::replace(&mut self.offsets, vec![0]));
        let nulls = self.nulls.finish();
        let keys = self.keys.finish();
        let values = self.values.finish();
        MapBlock::try_new(offsets, nulls, keys, values, Arc::clone(&self.key_ops))
    }
}

#[inline]
fn entry_offset(entries: usize) -> Result<i32> {
    i32::try_from(entries).map_err(|_| {
        Error::InvalidArgumentError(format!("map entry count {entries} exceeds offset range"))
    })
}
