//! The columnar container capability shared by every block shape.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use prism_result::Result;

/// Shared handle to a block. Views produced by `region` hold clones of the
/// same underlying buffers, so a handle can never outlive data it did not
/// copy.
pub type BlockRef = Arc<dyn Block>;

/// Identifying tag used by the serialization layer to select a
/// (de)serializer. The wire format itself lives outside this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockEncoding {
    Map,
    SingleMap,
    Int64Array,
    VariableWidth,
}

impl BlockEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            BlockEncoding::Map => "MAP",
            BlockEncoding::SingleMap => "MAP_ELEMENT",
            BlockEncoding::Int64Array => "INT64_ARRAY",
            BlockEncoding::VariableWidth => "VARIABLE_WIDTH",
        }
    }
}

/// Positional operations every column-shaped value supports.
///
/// Implementations are immutable value objects. `region` is always O(1) and
/// zero-copy; `copy_region` and `copy_positions` allocate fresh minimal
/// storage owned exclusively by the result. Size queries report retained
/// memory and feed the engine's memory-limit enforcement, so they must never
/// under-report.
pub trait Block: fmt::Debug + Send + Sync + 'static {
    /// Number of rows visible through this instance.
    fn position_count(&self) -> usize;

    /// True iff a null map is present. A `false` return guarantees no row is
    /// null without consulting per-row state.
    fn may_have_null(&self) -> bool;

    /// Whether the row at `position` is null. Absent null map means false.
    fn is_null(&self, position: usize) -> Result<bool>;

    /// Zero-copy view of `length` rows starting at `position`. Shares all
    /// backing buffers with `self`.
    fn region(&self, position: usize, length: usize) -> Result<BlockRef>;

    /// Physical compaction of `length` rows starting at `position` into
    /// fresh, exclusively-owned storage. Implementations may return a
    /// structurally-shared clone when nothing would change.
    fn copy_region(&self, position: usize, length: usize) -> Result<BlockRef>;

    /// Gather of the `length` row indices at `positions[offset..]`, in the
    /// given order, duplicates allowed.
    fn copy_positions(&self, positions: &[usize], offset: usize, length: usize)
    -> Result<BlockRef>;

    /// One row extracted into an independent single-row block.
    fn single_value_block(&self, position: usize) -> Result<BlockRef>;

    /// Approximate retained bytes of a contiguous row range.
    fn region_size_in_bytes(&self, position: usize, length: usize) -> Result<u64>;

    /// Approximate retained bytes of the rows selected by `mask`, which must
    /// have exactly `position_count` elements.
    fn positions_size_in_bytes(&self, mask: &[bool]) -> Result<u64>;

    /// Per-row data size estimate used for cardinality statistics, not exact
    /// memory accounting. Null rows estimate to zero.
    fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64>;

    /// Encoding tag consumed by the serialization layer.
    fn encoding(&self) -> BlockEncoding;

    /// Capability downcast to the concrete block type.
    fn as_any(&self) -> &dyn Any;
}

/// Incremental row-level producer of a block.
///
/// Builders guarantee the structural invariants of the blocks they finish
/// (monotonic offsets, null rows empty), so finished blocks are valid by
/// construction and readers perform only range checks.
pub trait BlockBuilder: Send {
    /// Append the row at `position` of `source`, which must be the concrete
    /// block type this builder produces.
    fn append_from(&mut self, source: &dyn Block, position: usize) -> Result<()>;

    /// Capability downcast to the concrete builder type, for typed appends.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Append a null row.
    fn append_null(&mut self);

    /// Rows appended so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish the block and reset the builder to empty.
    fn finish(&mut self) -> BlockRef;
}
