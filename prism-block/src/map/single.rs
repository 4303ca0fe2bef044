//! Zero-allocation view of one map row.

use std::any::Any;

use prism_result::{Error, Result};

use crate::block::{Block, BlockEncoding, BlockRef};
use crate::bounds::check_valid_position;
use crate::map::core::MapBlock;
use crate::map::hash_index::{EMPTY_SLOT, HASH_MULTIPLIER};
use crate::map::key_ops::KeyProbe;

/// One map row presented as a standalone row-level container.
///
/// The view covers the doubled entry sub-range
/// `[2 * entry_start, 2 * (entry_start + entry_len))` of its backing block:
/// keys and values each occupy one logical slot per entry, so even slots are
/// keys and odd slots are values. The backing block is shared, not owned;
/// the view has no lifecycle of its own.
#[derive(Clone, Debug)]
pub struct SingleMapBlock {
    block: MapBlock,
    /// Absolute doubled entry offset; always even.
    start: usize,
    /// Doubled entry count.
    len: usize,
}

impl SingleMapBlock {
    pub(crate) fn new(block: MapBlock, start: usize, len: usize) -> Self {
        debug_assert!(start % 2 == 0 && len % 2 == 0);
        Self { block, start, len }
    }

    /// Key-value pairs in this row.
    pub fn entry_count(&self) -> usize {
        self.len / 2
    }

    /// Absolute doubled entry offset of this view within the backing block.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Flattened key column of the backing block, addressed by absolute
    /// entry index.
    pub fn raw_keys(&self) -> &BlockRef {
        self.block.keys()
    }

    /// Flattened value column of the backing block.
    pub fn raw_values(&self) -> &BlockRef {
        self.block.values()
    }

    /// Absolute entry index in the child columns for a view-local slot.
    #[inline]
    pub fn absolute_entry(&self, slot: usize) -> usize {
        (self.start + slot) / 2
    }

    /// Find the probe key in this row, returning the view-local slot of the
    /// matching value (`2 * k + 1` for entry `k`), or `None` if the key is
    /// not present.
    ///
    /// Triggers the lazy, shared hash-index build on first use; subsequent
    /// lookups on any view of the same block reuse the published table.
    pub fn seek_key(&self, probe: &dyn KeyProbe) -> Result<Option<usize>> {
        if self.len == 0 {
            return Ok(None);
        }
        self.block.ensure_hash_index_loaded()?;
        let Some(table) = self.block.hash_index().get() else {
            return Err(Error::Internal(
                "hash index absent after ensure_hash_index_loaded".into(),
            ));
        };

        let entry_start = self.start / 2;
        let segment_offset = entry_start * HASH_MULTIPLIER;
        let segment_len = self.entry_count() * HASH_MULTIPLIER;
        let mut slot = (probe.hash() % segment_len as u64) as usize;
        loop {
            let key_position = table[segment_offset + slot];
            if key_position == EMPTY_SLOT {
                return Ok(None);
            }
            let entry = entry_start + key_position as usize;
            if probe.matches(self.block.keys().as_ref(), entry)? {
                return Ok(Some(key_position as usize * 2 + 1));
            }
            slot += 1;
            if slot == segment_len {
                slot = 0;
            }
        }
    }

    #[inline]
    fn child_for_slot(&self, slot: usize) -> (&BlockRef, usize) {
        let entry = self.absolute_entry(slot);
        if slot % 2 == 0 {
            (self.block.keys(), entry)
        } else {
            (self.block.values(), entry)
        }
    }

    fn unsupported(&self, operation: &str) -> Error {
        Error::Unsupported(format!(
            "{operation} interleaves key and value slots of a single map row"
        ))
    }
}

impl Block for SingleMapBlock {
    /// Logical slots, two per entry.
    fn position_count(&self) -> usize {
        self.len
    }

    fn may_have_null(&self) -> bool {
        self.block.keys().may_have_null() || self.block.values().may_have_null()
    }

    fn is_null(&self, position: usize) -> Result<bool> {
        check_valid_position(position, self.len)?;
        let (child, entry) = self.child_for_slot(position);
        child.is_null(entry)
    }

    fn region(&self, _position: usize, _length: usize) -> Result<BlockRef> {
        Err(self.unsupported("region"))
    }

    fn copy_region(&self, _position: usize, _length: usize) -> Result<BlockRef> {
        Err(self.unsupported("copy_region"))
    }

    fn copy_positions(
        &self,
        _positions: &[usize],
        _offset: usize,
        _length: usize,
    ) -> Result<BlockRef> {
        Err(self.unsupported("copy_positions"))
    }

    fn single_value_block(&self, position: usize) -> Result<BlockRef> {
        check_valid_position(position, self.len)?;
        let (child, entry) = self.child_for_slot(position);
        child.single_value_block(entry)
    }

    fn region_size_in_bytes(&self, _position: usize, _length: usize) -> Result<u64> {
        Err(self.unsupported("region_size_in_bytes"))
    }

    fn positions_size_in_bytes(&self, _mask: &[bool]) -> Result<u64> {
        Err(self.unsupported("positions_size_in_bytes"))
    }

    fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
        check_valid_position(position, self.len)?;
        let (child, entry) = self.child_for_slot(position);
        child.estimated_data_size_for_stats(entry)
    }

    fn encoding(&self) -> BlockEncoding {
        BlockEncoding::SingleMap
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
