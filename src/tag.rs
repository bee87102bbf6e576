//! Tag masks. A tag is one bit of a client's 32-bit membership mask; only
//! the low `NUM_TAGS` bits are ever set.

/// Number of tags (workspaces).
pub const NUM_TAGS: u32 = 9;

/// Every valid tag bit.
pub const TAGMASK: u32 = (1 << NUM_TAGS) - 1;

/// Mask for the 1-based tag number `n` (`tag(1) == 0b1`). Out of range
/// numbers give an empty mask.
pub fn tag(n: u32) -> u32 {
    if n == 0 || n > NUM_TAGS {
        0
    } else {
        1 << (n - 1)
    }
}

/// The lowest 1-based tag number set in `mask`, if any.
pub fn first_tag(mask: u32) -> Option<u32> {
    let mask = mask & TAGMASK;
    if mask == 0 {
        None
    } else {
        Some(mask.trailing_zeros() + 1)
    }
}
