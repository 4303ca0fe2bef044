//! Fixed-width 64-bit integer column.

use std::any::Any;
use std::sync::Arc;

use arrow::array::builder::NullBufferBuilder;
use arrow::buffer::{NullBuffer, ScalarBuffer};
use prism_result::{Error, Result};

use crate::block::{Block, BlockBuilder, BlockEncoding, BlockRef};
use crate::bounds::{
    check_array_range, check_valid_position, check_valid_positions, check_valid_region,
};
use crate::constants::NULL_FLAG_SIZE;

const VALUE_SIZE: u64 = size_of::<i64>() as u64;

/// Immutable column of 64-bit integers backed by shared arrow buffers.
///
/// `region` slices the buffers without copying; `copy_region` and
/// `copy_positions` materialize fresh minimal storage.
#[derive(Clone, Debug)]
pub struct Int64Block {
    values: ScalarBuffer<i64>,
    nulls: Option<NullBuffer>,
}

impl Int64Block {
    pub fn new(values: ScalarBuffer<i64>, nulls: Option<NullBuffer>) -> Result<Self> {
        if let Some(nulls) = &nulls
            && nulls.len() != values.len()
        {
            return Err(Error::InvariantViolation(format!(
                "null map has {} flags for {} values",
                nulls.len(),
                values.len()
            )));
        }
        Ok(Self { values, nulls })
    }

    pub fn from_values(values: Vec<i64>) -> Self {
        Self {
            values: ScalarBuffer::from(values),
            nulls: None,
        }
    }

    /// Value at `position` without a null check. Null positions hold an
    /// unspecified placeholder.
    #[inline]
    pub fn value(&self, position: usize) -> i64 {
        self.values[position]
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

impl Block for Int64Block {
    fn position_count(&self) -> usize {
        self.values.len()
    }

    fn may_have_null(&self) -> bool {
        self.nulls.is_some()
    }

    fn is_null(&self, position: usize) -> Result<bool> {
        check_valid_position(position, self.values.len())?;
        Ok(self.nulls.as_ref().is_some_and(|n| n.is_null(position)))
    }

    fn region(&self, position: usize, length: usize) -> Result<BlockRef> {
        check_valid_region(self.values.len(), position, length)?;
        Ok(Arc::new(Self {
            values: self.values.slice(position, length),
            nulls: self.nulls.as_ref().map(|n| n.slice(position, length)),
        }))
    }

    fn copy_region(&self, position: usize, length: usize) -> Result<BlockRef> {
        check_valid_region(self.values.len(), position, length)?;
        if position == 0 && length == self.values.len() {
            return Ok(Arc::new(self.clone()));
        }
        let values: Vec<i64> = self.values[position..position + length].to_vec();
        let nulls = compact_nulls(self.nulls.as_ref(), position, length);
        Ok(Arc::new(Self {
            values: ScalarBuffer::from(values),
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
        let mut values = Vec::with_capacity(length);
        let mut nulls = NullBufferBuilder::new(length);
        for &position in &positions[offset..offset + length] {
            check_valid_position(position, self.values.len())?;
            values.push(self.values[position]);
            nulls.append(!self.nulls.as_ref().is_some_and(|n| n.is_null(position)));
        }
        Ok(Arc::new(Self {
            values: ScalarBuffer::from(values),
            nulls: nulls.finish(),
        }))
    }

    fn single_value_block(&self, position: usize) -> Result<BlockRef> {
        self.copy_positions(&[position], 0, 1)
    }

    fn region_size_in_bytes(&self, position: usize, length: usize) -> Result<u64> {
        check_valid_region(self.values.len(), position, length)?;
        Ok((VALUE_SIZE + NULL_FLAG_SIZE) * length as u64)
    }

    fn positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64> {
        check_valid_positions(mask.len(), self.values.len())?;
        let selected = mask.iter().filter(|&&used| used).count() as u64;
        Ok((VALUE_SIZE + NULL_FLAG_SIZE) * selected)
    }

    fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
        Ok(if self.is_null(position)? { 0 } else { VALUE_SIZE })
    }

    fn encoding(&self) -> BlockEncoding {
        BlockEncoding::Int64Array
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[inline]
pub(crate) fn compact_nulls(
    nulls: Option<&NullBuffer>,
    position: usize,
    length: usize,
) -> Option<NullBuffer> {
    let nulls = nulls?;
    let window = nulls.slice(position, length);
    if window.null_count() == 0 {
        return None;
    }
    let mut out = NullBufferBuilder::new(length);
    for i in 0..length {
        out.append(window.is_valid(i));
    }
    out.finish()
}

/// Builder for [`Int64Block`].
#[derive(Debug)]
pub struct Int64BlockBuilder {
    values: Vec<i64>,
    nulls: NullBufferBuilder,
}

impl Default for Int64BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Int64BlockBuilder {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            nulls: NullBufferBuilder::new(0),
        }
    }

    pub fn append_value(&mut self, value: i64) {
        self.values.push(value);
        self.nulls.append_non_null();
    }
}

impl BlockBuilder for Int64BlockBuilder {
    fn append_from(&mut self, source: &dyn Block, position: usize) -> Result<()> {
        let source = source
            .as_any()
            .downcast_ref::<Int64Block>()
            .ok_or_else(|| {
                Error::InvalidArgumentError("source block is not an Int64Block".into())
            })?;
        if source.is_null(position)? {
            self.append_null();
        } else {
            self.append_value(source.value(position));
        }
        Ok(())
    }

    fn append_null(&mut self) {
        self.values.push(0);
        self.nulls.append_null();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn finish(&mut self) -> BlockRef {
        Arc::new(Int64Block {
            values: ScalarBuffer::from(std::mem::take(&mut self.values)),
            nulls: self.nulls.finish(),
        })
    }
}
