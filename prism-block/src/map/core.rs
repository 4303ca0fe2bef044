//! The map container core: entry-based offsets over flattened key/value
//! columns, with zero-copy region views and compacting copies.

use std::any::Any;
use std::sync::Arc;

use arrow::array::builder::NullBufferBuilder;
use arrow::buffer::{NullBuffer, ScalarBuffer};
use prism_result::{Error, Result};

use crate::block::{Block, BlockEncoding, BlockRef};
use crate::bounds::{
    check_array_range, check_valid_position, check_valid_positions, check_valid_region,
};
use crate::constants::{HASH_SLOT_SIZE, NULL_FLAG_SIZE, OFFSET_SIZE};
use crate::map::builder::MapBlockBuilder;
use crate::map::hash_index::{HASH_MULTIPLIER, MapHashIndex, build_hash_table};
use crate::map::key_ops::MapKeyOps;
use crate::map::single::SingleMapBlock;
use crate::primitive::compact_nulls;

/// Columnar container for a MAP-typed column.
///
/// Offsets are entry-based, not position-based: if `offsets[1]` is 6, the
/// first map row has 6 key-value pairs, not 6 key/value slots. Row `i` of a
/// view covers entries `offsets[offset_base + i]..offsets[offset_base + i + 1]`
/// of the flattened key and value columns.
///
/// `MapBlock` is an immutable value object. Cloning shares every backing
/// buffer; [`MapBlock::region`] produces views that differ only in offset
/// base and row count. The one mutable field, the per-row hash index, makes
/// a single absent-to-present transition with atomic visibility, so a block
/// can be shared freely across pipeline threads.
#[derive(Clone, Debug)]
pub struct MapBlock {
    offset_base: usize,
    position_count: usize,
    offsets: ScalarBuffer<i32>,
    /// Indexed by `offset_base + position`. Absent means no row is null.
    /// Invariant (guaranteed by builders): a null row has zero entries.
    nulls: Option<NullBuffer>,
    keys: BlockRef,
    values: BlockRef,
    hash_index: Arc<MapHashIndex>,
    key_ops: Arc<dyn MapKeyOps>,
}

impl MapBlock {
    /// Construct a base-0 block from builder output. Checks the structural
    /// shape (offset table length, child entry counts, null-map length);
    /// the ordering invariants themselves are the producer's contract and
    /// are not re-validated here.
    pub fn try_new(
        offsets: ScalarBuffer<i32>,
        nulls: Option<NullBuffer>,
        keys: BlockRef,
        values: BlockRef,
        key_ops: Arc<dyn MapKeyOps>,
    ) -> Result<Self> {
        if offsets.is_empty() {
            return Err(Error::InvariantViolation(
                "offset table must hold at least one entry".into(),
            ));
        }
        let position_count = offsets.len() - 1;
        let entry_count = offsets[position_count];
        if entry_count < 0 {
            return Err(Error::InvariantViolation(format!(
                "offset table ends at negative entry {entry_count}"
            )));
        }
        if keys.position_count() != entry_count as usize
            || values.position_count() != entry_count as usize
        {
            return Err(Error::InvariantViolation(format!(
                "offset table ends at entry {entry_count} but key column holds {} entries and \
                 value column holds {}",
                keys.position_count(),
                values.position_count()
            )));
        }
        if let Some(nulls) = &nulls
            && nulls.len() != position_count
        {
            return Err(Error::InvariantViolation(format!(
                "null map has {} flags for {position_count} positions",
                nulls.len()
            )));
        }
        let hash_index = Arc::new(MapHashIndex::absent(position_count, entry_count as usize));
        Ok(Self {
            offset_base: 0,
            position_count,
            offsets,
            nulls,
            keys,
            values,
            hash_index,
            key_ops,
        })
    }

    /// Internal constructor for derived blocks; bounds are the caller's
    /// responsibility.
    pub(crate) fn from_parts(
        offset_base: usize,
        position_count: usize,
        offsets: ScalarBuffer<i32>,
        nulls: Option<NullBuffer>,
        keys: BlockRef,
        values: BlockRef,
        hash_index: Arc<MapHashIndex>,
        key_ops: Arc<dyn MapKeyOps>,
    ) -> Self {
        debug_assert!(offsets.len() >= offset_base + position_count + 1);
        Self {
            offset_base,
            position_count,
            offsets,
            nulls,
            keys,
            values,
            hash_index,
            key_ops,
        }
    }

    /// Absolute entry index where row `position` begins. `position` may be
    /// `position_count` to address the end of the last row.
    #[inline]
    pub(crate) fn offset_at(&self, position: usize) -> usize {
        self.offsets[self.offset_base + position] as usize
    }

    /// Entry-based offset of row `position`.
    pub fn get_offset(&self, position: usize) -> Result<usize> {
        check_valid_position(position, self.position_count)?;
        Ok(self.offset_at(position))
    }

    pub fn offset_base(&self) -> usize {
        self.offset_base
    }

    /// Flattened key column. Offsets address it by absolute entry index.
    pub fn keys(&self) -> &BlockRef {
        &self.keys
    }

    /// Flattened value column, parallel to [`MapBlock::keys`].
    pub fn values(&self) -> &BlockRef {
        &self.values
    }

    pub fn key_ops(&self) -> &Arc<dyn MapKeyOps> {
        &self.key_ops
    }

    /// The hash index shared by every view of this block.
    pub fn hash_index(&self) -> &MapHashIndex {
        &self.hash_index
    }

    /// Build and publish the shared hash index if it is still absent. The
    /// build covers the full raw entry space (a region view builds for all
    /// rows of its backing block), once per index instance.
    pub fn ensure_hash_index_loaded(&self) -> Result<()> {
        if self.hash_index.is_present() {
            return Ok(());
        }
        let raw_rows = self.hash_index.expected_row_count();
        self.hash_index.ensure_built(|| {
            tracing::trace!(
                rows = raw_rows,
                entries = self.hash_index.expected_entry_count(),
                "building map hash index"
            );
            build_hash_table(
                self.keys.as_ref(),
                &self.offsets[..raw_rows + 1],
                self.key_ops.as_ref(),
            )
        })?;
        Ok(())
    }

    /// Zero-copy view of `length` rows starting at `position`. Shares the
    /// offset table, null map, child columns, and hash index; the index
    /// keeps addressing the full entry space by absolute index.
    pub fn region(&self, position: usize, length: usize) -> Result<MapBlock> {
        check_valid_region(self.position_count, position, length)?;
        Ok(Self {
            offset_base: self.offset_base + position,
            position_count: length,
            offsets: self.offsets.clone(),
            nulls: self.nulls.clone(),
            keys: Arc::clone(&self.keys),
            values: Arc::clone(&self.values),
            hash_index: Arc::clone(&self.hash_index),
            key_ops: Arc::clone(&self.key_ops),
        })
    }

    /// Physical compaction of `length` rows starting at `position`: fresh
    /// re-based offsets, compacted null map, deep-copied child sub-ranges,
    /// and a fresh hash index seeded with the corresponding table slice if
    /// one was already built. Returns a structurally-shared clone when
    /// nothing would change.
    pub fn copy_region(&self, position: usize, length: usize) -> Result<MapBlock> {
        check_valid_region(self.position_count, position, length)?;
        let start = self.offset_at(position);
        let end = self.offset_at(position + length);
        let entry_count = end - start;

        if self.offset_base == 0
            && position == 0
            && start == 0
            && length == self.position_count
            && self.offsets.len() == length + 1
            && self.keys.position_count() == entry_count
            && self.values.position_count() == entry_count
            && self.nulls.is_none()
        {
            // Already compact: share storage instead of duplicating it.
            return Ok(self.clone());
        }

        let offsets: Vec<i32> = self.offsets
            [self.offset_base + position..self.offset_base + position + length + 1]
            .iter()
            .map(|&o| o - start as i32)
            .collect();
        let nulls = compact_nulls(self.nulls.as_ref(), self.offset_base + position, length);
        let keys = self.keys.copy_region(start, entry_count)?;
        let values = self.values.copy_region(start, entry_count)?;

        let hash_index = match self.hash_index.get() {
            Some(table) => {
                let slice: Vec<i32> =
                    table[start * HASH_MULTIPLIER..end * HASH_MULTIPLIER].to_vec();
                MapHashIndex::with_table(ScalarBuffer::from(slice), length, entry_count)?
            }
            None => MapHashIndex::absent(length, entry_count),
        };

        Ok(Self::from_parts(
            0,
            length,
            ScalarBuffer::from(offsets),
            nulls,
            keys,
            values,
            Arc::new(hash_index),
            Arc::clone(&self.key_ops),
        ))
    }

    /// Gather of the `length` row indices at `positions[offset..]`, in the
    /// given order, duplicates allowed. Null rows contribute a zero-length
    /// entry range and a null flag. Cost is O(length + total selected
    /// entries).
    pub fn copy_positions(
        &self,
        positions: &[usize],
        offset: usize,
        length: usize,
    ) -> Result<MapBlock> {
        check_array_range(positions.len(), offset, length)?;
        let selected = &positions[offset..offset + length];

        let mut offsets: Vec<i32> = Vec::with_capacity(length + 1);
        offsets.push(0);
        let mut nulls = NullBufferBuilder::new(length);
        let mut entry_positions: Vec<usize> = Vec::new();
        for &position in selected {
            if self.is_null(position)? {
                offsets.push(offsets[offsets.len() - 1]);
                nulls.append_null();
            } else {
                let start = self.offset_at(position);
                let end = self.offset_at(position + 1);
                entry_positions.extend(start..end);
                offsets.push(offsets[offsets.len() - 1] + (end - start) as i32);
                nulls.append_non_null();
            }
        }

        let entry_count = entry_positions.len();
        let hash_index = match self.hash_index.get() {
            Some(table) => {
                let mut gathered: Vec<i32> = Vec::with_capacity(entry_count * HASH_MULTIPLIER);
                for &position in selected {
                    let start = self.offset_at(position);
                    let end = self.offset_at(position + 1);
                    gathered
                        .extend_from_slice(&table[start * HASH_MULTIPLIER..end * HASH_MULTIPLIER]);
                }
                MapHashIndex::with_table(ScalarBuffer::from(gathered), length, entry_count)?
            }
            None => MapHashIndex::absent(length, entry_count),
        };

        let keys = self.keys.copy_positions(&entry_positions, 0, entry_count)?;
        let values = self.values.copy_positions(&entry_positions, 0, entry_count)?;

        Ok(Self::from_parts(
            0,
            length,
            ScalarBuffer::from(offsets),
            nulls.finish(),
            keys,
            values,
            Arc::new(hash_index),
            Arc::clone(&self.key_ops),
        ))
    }

    /// Extract exactly one row into a new, independent one-row block,
    /// detached from the batch.
    pub fn single_value_block(&self, position: usize) -> Result<MapBlock> {
        check_valid_position(position, self.position_count)?;
        let start = self.offset_at(position);
        let end = self.offset_at(position + 1);
        let entry_count = end - start;

        let keys = self.keys.copy_region(start, entry_count)?;
        let values = self.values.copy_region(start, entry_count)?;
        let nulls = if self.is_null(position)? {
            let mut builder = NullBufferBuilder::new(1);
            builder.append_null();
            builder.finish()
        } else {
            None
        };

        let hash_index = match self.hash_index.get() {
            Some(table) => {
                let slice: Vec<i32> =
                    table[start * HASH_MULTIPLIER..end * HASH_MULTIPLIER].to_vec();
                MapHashIndex::with_table(ScalarBuffer::from(slice), 1, entry_count)?
            }
            None => MapHashIndex::absent(1, entry_count),
        };

        Ok(Self::from_parts(
            0,
            1,
            ScalarBuffer::from(vec![0, entry_count as i32]),
            nulls,
            keys,
            values,
            Arc::new(hash_index),
            Arc::clone(&self.key_ops),
        ))
    }

    /// Expose row `position` as a single-row view over the doubled entry
    /// range: keys and values each occupy one logical slot per entry.
    pub fn block(&self, position: usize) -> Result<SingleMapBlock> {
        check_valid_position(position, self.position_count)?;
        let start = self.offset_at(position);
        let end = self.offset_at(position + 1);
        Ok(SingleMapBlock::new(
            self.clone(),
            start * 2,
            (end - start) * 2,
        ))
    }

    /// Serialize the row's structure into a target row builder.
    pub fn write_position_to(&self, position: usize, target: &mut MapBlockBuilder) -> Result<()> {
        target.append_from_map(self, position)
    }

    /// Row extraction without range validation.
    ///
    /// # Safety
    ///
    /// `internal_position` must satisfy
    /// `offset_base <= internal_position < offset_base + position_count`.
    /// Callers violating this invoke undefined behavior.
    pub unsafe fn block_unchecked(&self, internal_position: usize) -> SingleMapBlock {
        debug_assert!(
            internal_position >= self.offset_base
                && internal_position < self.offset_base + self.position_count
        );
        let (start, end) = unsafe {
            (
                *self.offsets.get_unchecked(internal_position) as usize,
                *self.offsets.get_unchecked(internal_position + 1) as usize,
            )
        };
        SingleMapBlock::new(self.clone(), start * 2, (end - start) * 2)
    }

    /// Null check without range validation.
    ///
    /// # Safety
    ///
    /// A null map must be present (`may_have_null()`), and
    /// `internal_position` must satisfy
    /// `offset_base <= internal_position < offset_base + position_count`.
    /// Callers violating this invoke undefined behavior.
    pub unsafe fn is_null_unchecked(&self, internal_position: usize) -> bool {
        debug_assert!(self.may_have_null());
        debug_assert!(
            internal_position >= self.offset_base
                && internal_position < self.offset_base + self.position_count
        );
        match &self.nulls {
            Some(nulls) => !unsafe { nulls.inner().value_unchecked(internal_position) },
            None => false,
        }
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn may_have_null(&self) -> bool {
        self.nulls.is_some()
    }

    pub fn is_null(&self, position: usize) -> Result<bool> {
        check_valid_position(position, self.position_count)?;
        Ok(self
            .nulls
            .as_ref()
            .is_some_and(|n| n.is_null(self.offset_base + position)))
    }

    /// Per-row data size estimate for cardinality statistics: the sum of
    /// both children's per-entry estimates over the row's range, zero for a
    /// null row.
    pub fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
        check_valid_position(position, self.position_count)?;
        if self.is_null(position)? {
            return Ok(0);
        }
        let start = self.offset_at(position);
        let end = self.offset_at(position + 1);
        let mut size = 0u64;
        for entry in start..end {
            size += self.keys.estimated_data_size_for_stats(entry)?;
            size += self.values.estimated_data_size_for_stats(entry)?;
        }
        Ok(size)
    }

    /// Approximate retained bytes of a contiguous row range: the children's
    /// cost over the touched entries, one offset and one null flag per row,
    /// two index slots per entry (charged whether or not the table is built
    /// yet, since it may be built later), and the index instance overhead.
    /// Feeds memory-limit enforcement; never under-reports.
    pub fn region_size_in_bytes(&self, position: usize, length: usize) -> Result<u64> {
        check_valid_region(self.position_count, position, length)?;
        let start = self.offset_at(position);
        let end = self.offset_at(position + length);
        let entry_count = (end - start) as u64;
        Ok(self.keys.region_size_in_bytes(start, end - start)?
            + self.values.region_size_in_bytes(start, end - start)?
            + (OFFSET_SIZE + NULL_FLAG_SIZE) * length as u64
            + HASH_SLOT_SIZE * HASH_MULTIPLIER as u64 * entry_count
            + self.hash_index.instance_size_in_bytes())
    }

    /// [`MapBlock::region_size_in_bytes`] for an arbitrary boolean-selected
    /// subset of rows. The children are queried through their own selection
    /// masks over the flattened entry space.
    pub fn positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        check_valid_positions(mask.len(), self.position_count)?;
        let mut entry_mask = vec![false; self.keys.position_count()];
        let mut selected_rows = 0u64;
        let mut selected_entries = 0u64;
        for (position, &used) in mask.iter().enumerate() {
            if used {
                selected_rows += 1;
                let start = self.offset_at(position);
                let end = self.offset_at(position + 1);
                entry_mask[start..end].fill(true);
                selected_entries += (end - start) as u64;
            }
        }
        Ok(self.keys.positions_size_in_bytes(&entry_mask)?
            + self.values.positions_size_in_bytes(&entry_mask)?
            + (OFFSET_SIZE + NULL_FLAG_SIZE) * selected_rows
            + HASH_SLOT_SIZE * HASH_MULTIPLIER as u64 * selected_entries
            + self.hash_index.instance_size_in_bytes())
    }
}

impl Block for MapBlock {
    fn position_count(&self) -> usize {
        self.position_count
    }

    fn may_have_null(&self) -> bool {
        MapBlock::may_have_null(self)
    }

    fn is_null(&self, position: usize) -> Result<bool> {
        MapBlock::is_null(self, position)
    }

    fn region(&self, position: usize, length: usize) -> Result<BlockRef> {
        Ok(Arc::new(MapBlock::region(self, position, length)?))
    }

    fn copy_region(&self, position: usize, length: usize) -> Result<BlockRef> {
        Ok(Arc::new(MapBlock::copy_region(self, position, length)?))
    }

    fn copy_positions(
        &self,
        positions: &[usize],
        offset: usize,
        length: usize,
    ) -> Result<BlockRef> {
        Ok(Arc::new(MapBlock::copy_positions(
            self, positions, offset, length,
        )?))
    }

    fn single_value_block(&self, position: usize) -> Result<BlockRef> {
        Ok(Arc::new(MapBlock::single_value_block(self, position)?))
    }

    fn region_size_in_bytes(&self, position: usize, length: usize) -> Result<u64> {
        MapBlock::region_size_in_bytes(self, position, length)
    }

    fn positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        MapBlock::positions_size_in_bytes(self, mask)
    }

    fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
        MapBlock::estimated_data_size_for_stats(self, position)
    }

    fn encoding(&self) -> BlockEncoding {
        BlockEncoding::Map
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
