//! Per-slot byte costs used by the retained-size accounting.

/// One entry-based offset per row.
pub(crate) const OFFSET_SIZE: u64 = size_of::<i32>() as u64;
/// One null flag per row.
pub(crate) const NULL_FLAG_SIZE: u64 = 1;
/// One hash-table slot.
pub(crate) const HASH_SLOT_SIZE: u64 = size_of::<i32>() as u64;
