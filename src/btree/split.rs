//! Page splits.
//!
//! Both split flavors work on the merged logical sequence: the page's
//! existing entries with the incoming entry spliced in at its sorted
//! position. The sequence is partitioned by balanced byte usage rather
//! than entry count, so a run of long keys cannot leave one side nearly
//! empty.
//!
//! - Leaf split: the left page keeps the front of the sequence, a fresh
//!   right sibling takes the rest, and the right page's minimum key is
//!   promoted (copied — it stays in the right leaf, where scans need
//!   it). The doubly-linked leaf chain is restitched around the new
//!   page.
//! - Internal split: the entry at the balance point is promoted and
//!   appears in neither half; its child pointer becomes the right
//!   page's `leftmost_child`.
//!
//! On the left page, departing entries are removed slot-by-slot and the
//! page is then compacted, so all reclaimed space is contiguous before
//! the incoming entry (if it stays left) is placed.

use tracing::debug;

use crate::btree::insert::InternalItem;
use crate::btree::key::KeyValue;
use crate::btree::layout::{
    encode_internal_entry, InternalView, InternalViewMut, LeafView, LeafViewMut, INTERNAL_USABLE,
    LEAF_USABLE, SLOT_SIZE,
};
use crate::buffer::{BufferPool, PageWriteGuard};
use crate::common::{Result, NO_PAGE};

/// Index into the merged sequence at which the accumulated entry bytes
/// first reach half of the total, bounded to `1..=max` and advanced
/// until the bytes at and after it fit in `cap`.
///
/// A single entry can hold a large fraction of `cap`, so the plain
/// byte midpoint may leave one side over capacity when a big entry
/// straddles it. Entries are capped below half the usable area (see
/// the bounds asserted in `layout`), which guarantees the advance
/// terminates on a partition whose left side also fits.
fn balance_point(sizes: &[usize], max: usize, cap: usize) -> usize {
    let total: usize = sizes.iter().sum();
    let mut prefix = vec![0usize; sizes.len() + 1];
    for (i, s) in sizes.iter().enumerate() {
        prefix[i + 1] = prefix[i] + s;
    }

    let mut k = 1usize;
    while k < max && prefix[k + 1] <= total / 2 {
        k += 1;
    }
    while k < max && total - prefix[k] > cap {
        k += 1;
    }
    debug_assert!(prefix[k] <= cap && total - prefix[k] <= cap);
    k
}

/// Split a full leaf, placing `entry` (destined for logical slot
/// `insert_idx`) on whichever side it lands. Returns the promoted
/// separator.
pub(crate) fn split_leaf(
    pool: &BufferPool,
    guard: &mut PageWriteGuard<'_>,
    insert_idx: usize,
    entry: &[u8],
) -> Result<InternalItem> {
    let page_id = guard.page_id();

    let (split_at, right_entries, old_next) = {
        let view = LeafView::new(guard.as_slice(), page_id)?;
        let n = view.slot_count();

        let mut sizes: Vec<usize> = Vec::with_capacity(n + 1);
        for i in 0..n {
            sizes.push(view.entry_len_at(i) + SLOT_SIZE);
        }
        sizes.insert(insert_idx, entry.len() + SLOT_SIZE);

        let k = balance_point(&sizes, n, LEAF_USABLE);

        let mut right: Vec<Vec<u8>> = Vec::with_capacity(sizes.len() - k);
        for m in k..sizes.len() {
            if m == insert_idx {
                right.push(entry.to_vec());
            } else {
                let src = if m > insert_idx { m - 1 } else { m };
                right.push(view.entry_bytes_at(src).to_vec());
            }
        }
        (k, right, view.next_page())
    };
    let new_goes_left = insert_idx < split_at;

    let mut right_guard = pool.new_page()?;
    let right_no = right_guard.page_id().page_no;
    {
        let mut right = LeafViewMut::init(
            right_guard.as_mut_slice(),
            page_id.page_no,
            old_next.unwrap_or(NO_PAGE),
        );
        for (i, e) in right_entries.iter().enumerate() {
            right.insert_entry_slot(i, e);
        }
    }
    let separator = {
        let view = LeafView::new(right_guard.as_slice(), right_guard.page_id())?;
        KeyValue::from_bytes(view.key_at(0).to_vec())
    };
    drop(right_guard);

    {
        let mut left = LeafViewMut::new(guard.as_mut_slice(), page_id)?;
        let keep = if new_goes_left { split_at - 1 } else { split_at };
        let n = left.as_view().slot_count();
        for i in (keep..n).rev() {
            left.remove_entry_slot(i);
        }
        left.compact();
        left.set_next_page(right_no);
        if new_goes_left {
            left.insert_entry_slot(insert_idx, entry);
        }
    }

    // Restitch the old right neighbor's back pointer.
    if let Some(next_no) = old_next {
        let mut next_guard = pool.fetch_page_write(page_id.same_volume(next_no))?;
        let next_id = next_guard.page_id();
        LeafViewMut::new(next_guard.as_mut_slice(), next_id)?.set_prev_page(right_no);
    }

    debug!(left = %page_id, right = right_no, "split leaf page");
    Ok(InternalItem {
        child: right_no,
        key: separator,
    })
}

/// Split a full internal page around the balance-point entry, which is
/// promoted and removed from both halves. Returns the promoted
/// separator.
pub(crate) fn split_internal(
    pool: &BufferPool,
    guard: &mut PageWriteGuard<'_>,
    insert_idx: usize,
    item: &InternalItem,
) -> Result<InternalItem> {
    let page_id = guard.page_id();
    let new_entry = encode_internal_entry(item.child, item.key.as_bytes());

    let (split_at, promoted, right_entries) = {
        let view = InternalView::new(guard.as_slice(), page_id)?;
        let n = view.slot_count();

        let mut sizes: Vec<usize> = Vec::with_capacity(n + 1);
        for i in 0..n {
            sizes.push(view.entry_len_at(i) + SLOT_SIZE);
        }
        sizes.insert(insert_idx, new_entry.len() + SLOT_SIZE);

        // The promoted entry joins neither side, so cap the point one
        // short of the end to keep the right half non-empty.
        let k = balance_point(&sizes, sizes.len() - 2, INTERNAL_USABLE);

        let fetch = |m: usize| -> Vec<u8> {
            if m == insert_idx {
                new_entry.clone()
            } else {
                let src = if m > insert_idx { m - 1 } else { m };
                view.entry_bytes_at(src).to_vec()
            }
        };

        let promoted = fetch(k);
        let right: Vec<Vec<u8>> = (k + 1..sizes.len()).map(fetch).collect();
        (k, promoted, right)
    };
    let new_goes_left = insert_idx < split_at;

    // Decode the promoted entry: child u32, key_len u16, key bytes.
    let promoted_child = u32::from_le_bytes([promoted[0], promoted[1], promoted[2], promoted[3]]);
    let promoted_klen = u16::from_le_bytes([promoted[4], promoted[5]]) as usize;
    let promoted_key = KeyValue::from_bytes(promoted[6..6 + promoted_klen].to_vec());

    let mut right_guard = pool.new_page()?;
    let right_no = right_guard.page_id().page_no;
    {
        let mut right = InternalViewMut::init(right_guard.as_mut_slice(), promoted_child);
        for (i, e) in right_entries.iter().enumerate() {
            right.insert_entry_slot(i, e);
        }
    }
    drop(right_guard);

    {
        let mut left = InternalViewMut::new(guard.as_mut_slice(), page_id)?;
        let keep = if new_goes_left { split_at - 1 } else { split_at };
        let n = left.as_view().slot_count();
        for i in (keep..n).rev() {
            left.remove_entry_slot(i);
        }
        left.compact();
        if new_goes_left {
            left.insert_entry_slot(insert_idx, &new_entry);
        }
    }

    debug!(left = %page_id, right = right_no, "split internal page");
    Ok(InternalItem {
        child: right_no,
        key: promoted_key,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::balance_point;
    use crate::btree::layout::LEAF_USABLE;

    #[test]
    fn test_balance_point_centers_uniform_entries() {
        let sizes = vec![18usize; 227];
        let k = balance_point(&sizes, 226, LEAF_USABLE);
        assert!((100..=127).contains(&k), "k = {k}");
    }

    #[test]
    fn test_balance_point_keeps_both_sides_within_capacity() {
        // Two near-maximum entries straddle the byte midpoint, so the
        // raw balance index would hand the right side more bytes than
        // a page holds.
        let mut sizes = vec![22usize; 56];
        sizes.push(1614);
        sizes.push(1614);
        sizes.extend(std::iter::repeat(22).take(55));

        let k = balance_point(&sizes, sizes.len() - 1, LEAF_USABLE);
        let left: usize = sizes[..k].iter().sum();
        let right: usize = sizes[k..].iter().sum();
        assert!(left <= LEAF_USABLE, "left half holds {left} bytes");
        assert!(right <= LEAF_USABLE, "right half holds {right} bytes");
    }

    #[test]
    fn test_balance_point_never_empties_a_side() {
        let sizes = vec![2000usize, 30];
        let k = balance_point(&sizes, 1, LEAF_USABLE);
        assert_eq!(k, 1);
    }
}
