//! Lazily-built per-row hash index over a map block's flattened entries.

use std::sync::OnceLock;

use arrow::buffer::ScalarBuffer;
use prism_result::{Error, Result};

use crate::block::Block;
use crate::constants::HASH_SLOT_SIZE;
use crate::map::key_ops::MapKeyOps;

/// Inverse of the hash fill ratio; must be an integer. Each row's table
/// segment spans `[offsets[i] * HASH_MULTIPLIER, offsets[i+1] * HASH_MULTIPLIER)`.
pub const HASH_MULTIPLIER: usize = 2;

/// Slot value marking an empty hash-table position.
pub(crate) const EMPTY_SLOT: i32 = -1;

/// Publish-once cell holding the open-addressing tables of every row of a
/// map block, flattened into one integer array. Slots hold row-relative
/// entry indices.
///
/// Created absent alongside its block and built at most once per instance,
/// on the first lookup that needs it. The table is published atomically as a
/// whole: a thread that observes it present sees it fully formed. Because
/// building is a pure function of the immutable block, racing builders may
/// redundantly build; the first publication wins and later equivalents are
/// dropped.
///
/// Blocks produced by copy or gather operations get a fresh index, never a
/// reused one: the table addresses entries by position, so it is not
/// portable across entry reordering.
#[derive(Debug)]
pub struct MapHashIndex {
    table: OnceLock<ScalarBuffer<i32>>,
    /// Rows this index logically covers.
    expected_row_count: usize,
    /// Total entries across all rows as if fully built; retained-size
    /// accounting charges for the table whether or not it exists yet.
    expected_entry_count: usize,
}

impl MapHashIndex {
    /// A not-yet-built index for `row_count` rows and `entry_count` total
    /// entries.
    pub fn absent(row_count: usize, entry_count: usize) -> Self {
        Self {
            table: OnceLock::new(),
            expected_row_count: row_count,
            expected_entry_count: entry_count,
        }
    }

    /// An index seeded with an already-derived table, as produced by the
    /// copy and gather paths. The length contract is checked here, once,
    /// at construction.
    pub fn with_table(
        table: ScalarBuffer<i32>,
        row_count: usize,
        entry_count: usize,
    ) -> Result<Self> {
        if table.len() != entry_count * HASH_MULTIPLIER {
            return Err(Error::InvariantViolation(format!(
                "hash table has {} slots for {entry_count} entries (expected {})",
                table.len(),
                entry_count * HASH_MULTIPLIER
            )));
        }
        let index = Self::absent(row_count, entry_count);
        index.set(table);
        Ok(index)
    }

    /// The published table, if any. Pure read; safe from any thread at any
    /// time.
    #[inline]
    pub fn get(&self) -> Option<&ScalarBuffer<i32>> {
        self.table.get()
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        self.table.get().is_some()
    }

    pub fn expected_row_count(&self) -> usize {
        self.expected_row_count
    }

    pub fn expected_entry_count(&self) -> usize {
        self.expected_entry_count
    }

    /// Build and publish the table if absent, then return it. `build` runs
    /// outside any lock; if another thread published first, its table wins
    /// and the redundant result is discarded.
    pub fn ensure_built<F>(&self, build: F) -> Result<&ScalarBuffer<i32>>
    where
        F: FnOnce() -> Result<ScalarBuffer<i32>>,
    {
        if let Some(table) = self.table.get() {
            return Ok(table);
        }
        let built = build()?;
        if built.len() != self.expected_entry_count * HASH_MULTIPLIER {
            return Err(Error::InvariantViolation(format!(
                "built hash table has {} slots for {} entries (expected {})",
                built.len(),
                self.expected_entry_count,
                self.expected_entry_count * HASH_MULTIPLIER
            )));
        }
        Ok(self.table.get_or_init(|| built))
    }

    /// Seed the table directly. Callers are the copy/gather paths, which
    /// derive correctly-sized slices by construction; the length contract
    /// was checked when this index was created.
    pub(crate) fn set(&self, table: ScalarBuffer<i32>) {
        debug_assert_eq!(table.len(), self.expected_entry_count * HASH_MULTIPLIER);
        let _ = self.table.set(table);
    }

    /// Fixed per-instance overhead, charged by region and positions size
    /// queries.
    pub fn instance_size_in_bytes(&self) -> u64 {
        size_of::<Self>() as u64
    }

    /// Instance overhead plus the table array sized as if built.
    pub fn retained_size_in_bytes(&self) -> u64 {
        self.instance_size_in_bytes()
            + (self.expected_entry_count * HASH_MULTIPLIER) as u64 * HASH_SLOT_SIZE
    }
}

/// Build the flattened open-addressing tables for every row described by
/// `offsets` (the full entry-based offset table, one slot per row plus one).
/// Pure function of the immutable key column, so redundant concurrent builds
/// produce equivalent tables.
pub(crate) fn build_hash_table(
    keys: &dyn Block,
    offsets: &[i32],
    key_ops: &dyn MapKeyOps,
) -> Result<ScalarBuffer<i32>> {
    let entry_count = offsets[offsets.len() - 1] as usize;
    let mut table = vec![EMPTY_SLOT; entry_count * HASH_MULTIPLIER];
    for row in 0..offsets.len() - 1 {
        let start = offsets[row] as usize;
        let end = offsets[row + 1] as usize;
        key_ops.build_row_segment(
            keys,
            start,
            &mut table[start * HASH_MULTIPLIER..end * HASH_MULTIPLIER],
        )?;
    }
    Ok(ScalarBuffer::from(table))
}
