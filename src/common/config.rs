//! Configuration constants for arbordb.

/// Size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems, so pages can be read and
/// written with aligned I/O.
///
/// With 4KB pages and 32-bit page numbers a single volume can grow to
/// 2^32 × 4KB = 16TB.
pub const PAGE_SIZE: usize = 4096;

/// Alignment boundary for key bytes stored inside page entries.
///
/// Keys are padded to a multiple of this so the payload that follows a
/// key always sits at a well-defined offset regardless of key length.
pub const KEY_ALIGNMENT: usize = 4;

/// Maximum encoded length of a (possibly composite) key in bytes.
///
/// Large enough that a single leaf entry can exceed a third of a page's
/// usable space, which is the trigger for redirecting its payload into
/// an overflow chain.
pub const MAX_KEY_LEN: usize = 1600;

/// Maximum number of parts in a composite key descriptor.
pub const MAX_KEY_PARTS: usize = 8;

/// Round a key length up to the next [`KEY_ALIGNMENT`] boundary.
#[inline]
pub const fn aligned_key_len(klen: usize) -> usize {
    (klen + KEY_ALIGNMENT - 1) & !(KEY_ALIGNMENT - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_aligned_key_len() {
        assert_eq!(aligned_key_len(0), 0);
        assert_eq!(aligned_key_len(1), 4);
        assert_eq!(aligned_key_len(4), 4);
        assert_eq!(aligned_key_len(5), 8);
        assert_eq!(aligned_key_len(MAX_KEY_LEN), MAX_KEY_LEN);
    }
}
