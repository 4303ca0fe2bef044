//! Variable-width byte-string column.

use std::any::Any;
use std::sync::Arc;

use arrow::array::builder::NullBufferBuilder;
use arrow::buffer::{Buffer, NullBuffer, ScalarBuffer};
use prism_result::{Error, Result};

use crate::block::{Block, BlockBuilder, BlockEncoding, BlockRef};
use crate::bounds::{
    check_array_range, check_valid_position, check_valid_positions, check_valid_region,
};
use crate::constants::{NULL_FLAG_SIZE, OFFSET_SIZE};
use crate::primitive::compact_nulls;

/// Immutable column of variable-width byte strings: a shared byte buffer plus
/// an entry-based offset table, the same layout the map container uses one
/// level up.
#[derive(Clone, Debug)]
pub struct BytesBlock {
    bytes: Buffer,
    /// `offsets[i]..offsets[i+1]` is the byte range of position `i`.
    offsets: ScalarBuffer<i32>,
    nulls: Option<NullBuffer>,
}

impl BytesBlock {
    pub fn new(
        bytes: Buffer,
        offsets: ScalarBuffer<i32>,
        nulls: Option<NullBuffer>,
    ) -> Result<Self> {
        if offsets.is_empty() {
            return Err(Error::InvariantViolation(
                "offset table must hold at least one entry".into(),
            ));
        }
        let position_count = offsets.len() - 1;
        if let Some(nulls) = &nulls
            && nulls.len() != position_count
        {
            return Err(Error::InvariantViolation(format!(
                "null map has {} flags for {position_count} positions",
                nulls.len()
            )));
        }
        if offsets[position_count] as usize > bytes.len() {
            return Err(Error::InvariantViolation(format!(
                "offset table ends at byte {} but buffer holds {}",
                offsets[position_count],
                bytes.len()
            )));
        }
        Ok(Self {
            bytes,
            offsets,
            nulls,
        })
    }

    pub fn from_slices<S: AsRef<[u8]>>(values: &[S]) -> Self {
        let mut builder = BytesBlockBuilder::new();
        for value in values {
            builder.append_value(value.as_ref());
        }
        Self {
            bytes: Buffer::from(std::mem::take(&mut builder.bytes)),
            offsets: ScalarBuffer::from(std::mem::take(&mut builder.offsets)),
            nulls: None,
        }
    }

    /// Bytes of the entry at `position` without a null check. Null positions
    /// hold an empty slice.
    #[inline]
    pub fn value(&self, position: usize) -> &[u8] {
        let start = self.offsets[position] as usize;
        let end = self.offsets[position + 1] as usize;
        &self.bytes.as_slice()[start..end]
    }

    #[inline]
    fn byte_len(&self, position: usize) -> u64 {
        (self.offsets[position + 1] - self.offsets[position]) as u64
    }
}

impl Block for BytesBlock {
    fn position_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn may_have_null(&self) -> bool {
        self.nulls.is_some()
    }

    fn is_null(&self, position: usize) -> Result<bool> {
        check_valid_position(position, self.position_count())?;
        Ok(self.nulls.as_ref().is_some_and(|n| n.is_null(position)))
    }

    fn region(&self, position: usize, length: usize) -> Result<BlockRef> {
        check_valid_region(self.position_count(), position, length)?;
        Ok(Arc::new(Self {
            bytes: self.bytes.clone(),
            offsets: self.offsets.slice(position, length + 1),
            nulls: self.nulls.as_ref().map(|n| n.slice(position, length)),
        }))
    }

    fn copy_region(&self, position: usize, length: usize) -> Result<BlockRef> {
        check_valid_region(self.position_count(), position, length)?;
        let start = self.offsets[position] as usize;
        let end = self.offsets[position + length] as usize;
        if position == 0 && length == self.position_count() && start == 0 && end == self.bytes.len()
        {
            return Ok(Arc::new(self.clone()));
        }
        let bytes = self.bytes.as_slice()[start..end].to_vec();
        let offsets: Vec<i32> = self.offsets[position..position + length + 1]
            .iter()
            .map(|&o| o - start as i32)
            .collect();
        let nulls = compact_nulls(self.nulls.as_ref(), position, length);
        Ok(Arc::new(Self {
            bytes: Buffer::from(bytes),
            offsets: ScalarBuffer::from(offsets),
            nulls,
        }))
    }

    fn copy_positions(
        &self,
        positions: &[usize],
        offset: usize,
        length: usize,
    ) -> Result<BlockRef> {
        check_array_range(positions.len(), offset, length)?;
        let mut builder = BytesBlockBuilder::new();
        for &position in &positions[offset..offset + length] {
            builder.append_from(self, position)?;
        }
        Ok(builder.finish())
    }

    fn single_value_block(&self, position: usize) -> Result<BlockRef> {
        self.copy_positions(&[position], 0, 1)
    }

    fn region_size_in_bytes(&self, position: usize, length: usize) -> Result<u64> {
        check_valid_region(self.position_count(), position, length)?;
        let span = (self.offsets[position + length] - self.offsets[position]) as u64;
        Ok(span + (OFFSET_SIZE + NULL_FLAG_SIZE) * length as u64)
    }

    fn positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        check_valid_positions(mask.len(), self.position_count())?;
        let mut size = 0u64;
        for (position, &used) in mask.iter().enumerate() {
            if used {
                size += self.byte_len(position) + OFFSET_SIZE + NULL_FLAG_SIZE;
            }
        }
        Ok(size)
    }

    fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
        Ok(if self.is_null(position)? {
            0
        } else {
            self.byte_len(position)
        })
    }

    fn encoding(&self) -> BlockEncoding {
        BlockEncoding::VariableWidth
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builder for [`BytesBlock`].
#[derive(Debug)]
pub struct BytesBlockBuilder {
    bytes: Vec<u8>,
    offsets: Vec<i32>,
    nulls: NullBufferBuilder,
}

impl Default for BytesBlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BytesBlockBuilder {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            offsets: vec![0],
            nulls: NullBufferBuilder::new(0),
        }
    }

    pub fn append_value(&mut self, value: &[u8]) {
        self.bytes.extend_from_slice(value);
        self.offsets.push(self.bytes.len() as i32);
        self.nulls.append_non_null();
    }
}

impl BlockBuilder for BytesBlockBuilder {
    fn append_from(&mut self, source: &dyn Block, position: usize) -> Result<()> {
        let source = source
            .as_any()
            .downcast_ref::<BytesBlock>()
            .ok_or_else(|| {
                Error::InvalidArgumentError("source block is not a BytesBlock".into())
            })?;
        if source.is_null(position)? {
            self.append_null();
        } else {
            self.append_value(source.value(position));
        }
        Ok(())
    }

    fn append_null(&mut self) {
        self.offsets.push(self.bytes.len() as i32);
        self.nulls.append_null();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn finish(&mut self) -> BlockRef {
        let block = BytesBlock {
            bytes: Buffer::from(std::mem::take(&mut self.bytes)),
            offsets: ScalarBuffer::from(std::mem::replace(&mut self.offsets, vec![0])),
            nulls: self.nulls.finish(),
        };
        Arc::new(block)
    }
}
