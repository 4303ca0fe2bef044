//! Range validation shared by all block shapes.

use prism_result::{Error, Result};

/// `position` must address a readable row of a block with `position_count`
/// rows.
#[inline]
pub(crate) fn check_valid_position(position: usize, position_count: usize) -> Result<()> {
    if position >= position_count {
        return Err(Error::InvalidArgumentError(format!(
            "position {position} out of range for block with {position_count} positions"
        )));
    }
    Ok(())
}

/// `[position, position + length)` must lie within `[0, position_count)`.
#[inline]
pub(crate) fn check_valid_region(
    position_count: usize,
    position: usize,
    length: usize,
) -> Result<()> {
    if position
        .checked_add(length)
        .is_none_or(|end| end > position_count)
    {
        return Err(Error::InvalidArgumentError(format!(
            "region [{position}, {position}+{length}) out of range for block with \
             {position_count} positions"
        )));
    }
    Ok(())
}

/// `[offset, offset + length)` must lie within a positions array of
/// `positions_len` elements.
#[inline]
pub(crate) fn check_array_range(positions_len: usize, offset: usize, length: usize) -> Result<()> {
    if offset
        .checked_add(length)
        .is_none_or(|end| end > positions_len)
    {
        return Err(Error::InvalidArgumentError(format!(
            "selection [{offset}, {offset}+{length}) out of range for positions array of \
             length {positions_len}"
        )));
    }
    Ok(())
}

/// A selection mask must have exactly one flag per row.
#[inline]
pub(crate) fn check_valid_positions(mask_len: usize, position_count: usize) -> Result<()> {
    if mask_len != position_count {
        return Err(Error::InvalidArgumentError(format!(
            "selection mask has {mask_len} flags for block with {position_count} positions"
        )));
    }
    Ok(())
}
