//! Columnar in-memory block containers for the Prism vectorized execution
//! engine.
//!
//! The centerpiece is [`MapBlock`], the representation of a nested MAP-typed
//! column: an entry-based offset table, flattened key and value columns, and a
//! lazily-built per-row hash index that accelerates key lookup within a row.
//! Blocks are immutable value objects; `region` produces zero-copy views that
//! share backing buffers, while `copy_region`/`copy_positions` produce fresh,
//! exclusively-owned storage for compaction and reordering.
//!
//! Every column-shaped value implements the [`Block`] capability, so map
//! containers compose over opaque key/value columns without interpreting
//! their contents.

pub mod block;
pub mod map;
pub mod primitive;
pub mod varwidth;

pub(crate) mod bounds;
pub(crate) mod constants;

pub use block::{Block, BlockBuilder, BlockEncoding, BlockRef};
pub use map::{
    HASH_MULTIPLIER, MapBlock, MapBlockBuilder, MapHashIndex, SingleMapBlock,
    key_ops::{BytesKeyOps, BytesProbe, Int64KeyOps, Int64Probe, KeyProbe, MapKeyOps},
};
pub use primitive::{Int64Block, Int64BlockBuilder};
pub use prism_result::{Error, Result};
pub use varwidth::{BytesBlock, BytesBlockBuilder};
