//! Injected key capabilities: hashing and equality over entries of a key
//! column, plus the hash-table build routine they drive.
//!
//! The map container never interprets key contents itself. Everything that
//! needs to understand a key (hashing an entry while building the index,
//! comparing a probe value against a stored entry) goes through these
//! traits, bound once at block construction.

use std::fmt;
use std::hash::Hasher;

use prism_result::{Error, Result};
use rustc_hash::FxHasher;

use crate::block::Block;
use crate::map::hash_index::{EMPTY_SLOT, HASH_MULTIPLIER};
use crate::primitive::Int64Block;
use crate::varwidth::BytesBlock;

/// Key-side capability of a map block: how entries of its key column hash,
/// and how one row's hash-table segment is populated.
pub trait MapKeyOps: fmt::Debug + Send + Sync {
    /// Hash of the key at `entry` in the flattened key column.
    fn hash_entry(&self, keys: &dyn Block, entry: usize) -> Result<u64>;

    /// Populate one row's table segment. `segment` covers the row's slots
    /// (`entry_count * HASH_MULTIPLIER` of them, pre-filled empty) and
    /// receives row-relative entry indices.
    ///
    /// This is the policy carrier for the index layout: an implementation
    /// that needs a different duplicate-key tie-break overrides it. The
    /// default probe-inserts every entry; producers guarantee keys within a
    /// row are pairwise distinct, so the default never has a tie to break.
    fn build_row_segment(
        &self,
        keys: &dyn Block,
        entry_start: usize,
        segment: &mut [i32],
    ) -> Result<()> {
        let size = segment.len();
        let entry_count = size / HASH_MULTIPLIER;
        for i in 0..entry_count {
            let hash = self.hash_entry(keys, entry_start + i)?;
            let mut slot = (hash % size as u64) as usize;
            while segment[slot] != EMPTY_SLOT {
                slot += 1;
                if slot == size {
                    slot = 0;
                }
            }
            segment[slot] = i as i32;
        }
        Ok(())
    }
}

/// Lookup-side counterpart: one probe value, hashed once, compared against
/// stored entries without this crate seeing the key representation.
pub trait KeyProbe {
    fn hash(&self) -> u64;

    /// Whether the key at `entry` in the flattened key column equals this
    /// probe value.
    fn matches(&self, keys: &dyn Block, entry: usize) -> Result<bool>;
}

#[inline]
fn fx_hash_i64(value: i64) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_i64(value);
    hasher.finish()
}

#[inline]
fn fx_hash_bytes(value: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(value);
    hasher.finish()
}

fn downcast<'a, T: 'static>(keys: &'a dyn Block, expected: &str) -> Result<&'a T> {
    keys.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::Internal(format!(
            "map key ops wired to a key column that is not a {expected}"
        ))
    })
}

/// Stock key ops for [`Int64Block`] keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct Int64KeyOps;

impl MapKeyOps for Int64KeyOps {
    fn hash_entry(&self, keys: &dyn Block, entry: usize) -> Result<u64> {
        let keys = downcast::<Int64Block>(keys, "Int64Block")?;
        Ok(fx_hash_i64(keys.value(entry)))
    }
}

/// Probe for one i64 key value.
#[derive(Clone, Copy, Debug)]
pub struct Int64Probe(pub i64);

impl KeyProbe for Int64Probe {
    fn hash(&self) -> u64 {
        fx_hash_i64(self.0)
    }

    fn matches(&self, keys: &dyn Block, entry: usize) -> Result<bool> {
        let keys = downcast::<Int64Block>(keys, "Int64Block")?;
        Ok(keys.value(entry) == self.0)
    }
}

/// Stock key ops for [`BytesBlock`] keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesKeyOps;

impl MapKeyOps for BytesKeyOps {
    fn hash_entry(&self, keys: &dyn Block, entry: usize) -> Result<u64> {
        let keys = downcast::<BytesBlock>(keys, "BytesBlock")?;
        Ok(fx_hash_bytes(keys.value(entry)))
    }
}

/// Probe for one byte-string key value.
#[derive(Clone, Copy, Debug)]
pub struct BytesProbe<'a>(pub &'a [u8]);

impl KeyProbe for BytesProbe<'_> {
    fn hash(&self) -> u64 {
        fx_hash_bytes(self.0)
    }

    fn matches(&self, keys: &dyn Block, entry: usize) -> Result<bool> {
        let keys = downcast::<BytesBlock>(keys, "BytesBlock")?;
        Ok(keys.value(entry) == self.0)
    }
}
