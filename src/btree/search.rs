//! Binary search within a single B-tree page.
//!
//! Two flavors, with deliberately different answers:
//! - leaf search returns the partition point (index of the first entry
//!   with key >= the probe) plus an exact-match flag, which is also the
//!   insertion index when no match exists;
//! - internal search returns the index of the last entry with
//!   key <= the probe, or `None` when the probe is below every
//!   separator, in which case descent follows `leftmost_child`.

use std::cmp::Ordering;

use crate::btree::key::{key_compare, KeyDescriptor};
use crate::btree::layout::{InternalView, LeafView};
use crate::common::Result;

/// Outcome of a leaf search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafSearch {
    /// Whether an entry with exactly the probe key exists.
    pub found: bool,
    /// Index of the first entry with key >= the probe; equals
    /// `slot_count` when every entry is smaller. This is the insertion
    /// index when `found` is false.
    pub index: usize,
}

/// Binary-search a leaf page for `key`.
pub fn search_leaf(desc: &KeyDescriptor, leaf: &LeafView<'_>, key: &[u8]) -> Result<LeafSearch> {
    let mut lo = 0usize;
    let mut hi = leaf.slot_count();
    let mut found = false;

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match key_compare(desc, leaf.key_at(mid), key)? {
            Ordering::Less => lo = mid + 1,
            Ordering::Equal => {
                found = true;
                hi = mid;
            }
            Ordering::Greater => hi = mid,
        }
    }

    Ok(LeafSearch { found, index: lo })
}

/// Binary-search an internal page for the routing slot of `key`.
///
/// Returns the index of the last entry whose separator is <= `key`, or
/// `None` when `key` is below all separators (descend via
/// `leftmost_child`). Keys equal to a separator route to that
/// separator's child.
pub fn search_internal(
    desc: &KeyDescriptor,
    page: &InternalView<'_>,
    key: &[u8],
) -> Result<Option<usize>> {
    let mut lo = 0usize;
    let mut hi = page.slot_count();

    // Invariant: entries below lo have separator <= key, entries at or
    // after hi have separator > key.
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match key_compare(desc, page.key_at(mid), key)? {
            Ordering::Greater => hi = mid,
            _ => lo = mid + 1,
        }
    }

    Ok(if lo == 0 { None } else { Some(lo - 1) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::key::{KeyPart, KeyValue};
    use crate::btree::layout::{
        encode_internal_entry, encode_leaf_entry, InternalViewMut, LeafPayload, LeafViewMut,
    };
    use crate::common::config::PAGE_SIZE;
    use crate::common::{ObjectId, NO_PAGE};

    fn desc() -> KeyDescriptor {
        KeyDescriptor::new(vec![KeyPart::integer(4)])
    }

    fn ikey(v: i32) -> KeyValue {
        KeyValue::builder().push_i32(v).build()
    }

    /// Leaf with keys 10, 20, 30, 40.
    fn build_leaf(data: &mut [u8; PAGE_SIZE]) -> LeafViewMut<'_> {
        let mut leaf = LeafViewMut::init(data, NO_PAGE, NO_PAGE);
        for (i, v) in [10, 20, 30, 40].iter().enumerate() {
            let e = encode_leaf_entry(
                1,
                ikey(*v).as_bytes(),
                LeafPayload::Inline(ObjectId::new(*v as u32, 0, 0)),
            );
            leaf.insert_entry_slot(i, &e);
        }
        leaf
    }

    #[test]
    fn test_leaf_search_exact() {
        let mut data = [0u8; PAGE_SIZE];
        let leaf = build_leaf(&mut data);
        let view = leaf.as_view();
        let d = desc();

        let hit = search_leaf(&d, &view, ikey(30).as_bytes()).unwrap();
        assert!(hit.found);
        assert_eq!(hit.index, 2);

        let first = search_leaf(&d, &view, ikey(10).as_bytes()).unwrap();
        assert!(first.found);
        assert_eq!(first.index, 0);
    }

    #[test]
    fn test_leaf_search_partition_point() {
        let mut data = [0u8; PAGE_SIZE];
        let leaf = build_leaf(&mut data);
        let view = leaf.as_view();
        let d = desc();

        // Between 20 and 30: insertion index 2
        let mid = search_leaf(&d, &view, ikey(25).as_bytes()).unwrap();
        assert!(!mid.found);
        assert_eq!(mid.index, 2);

        // Below everything
        let low = search_leaf(&d, &view, ikey(1).as_bytes()).unwrap();
        assert!(!low.found);
        assert_eq!(low.index, 0);

        // Above everything: index == slot_count
        let high = search_leaf(&d, &view, ikey(99).as_bytes()).unwrap();
        assert!(!high.found);
        assert_eq!(high.index, 4);
    }

    #[test]
    fn test_leaf_search_empty_page() {
        let mut data = [0u8; PAGE_SIZE];
        let leaf = LeafViewMut::init(&mut data, NO_PAGE, NO_PAGE);
        let r = search_leaf(&desc(), &leaf.as_view(), ikey(5).as_bytes()).unwrap();
        assert!(!r.found);
        assert_eq!(r.index, 0);
    }

    #[test]
    fn test_internal_search_routing() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = InternalViewMut::init(&mut data, 100);
        // Separators 10, 20, 30 with children 101, 102, 103
        for (i, v) in [10, 20, 30].iter().enumerate() {
            page.insert_entry_slot(i, &encode_internal_entry(101 + i as u32, ikey(*v).as_bytes()));
        }
        let view = page.as_view();
        let d = desc();

        // Below the first separator: leftmost child
        assert_eq!(search_internal(&d, &view, ikey(5).as_bytes()).unwrap(), None);
        // Equal to a separator routes to that separator's child
        assert_eq!(search_internal(&d, &view, ikey(20).as_bytes()).unwrap(), Some(1));
        // Between separators
        assert_eq!(search_internal(&d, &view, ikey(25).as_bytes()).unwrap(), Some(1));
        // Above everything
        assert_eq!(search_internal(&d, &view, ikey(99).as_bytes()).unwrap(), Some(2));
    }
}
