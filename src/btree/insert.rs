//! Recursive insertion with bottom-up split propagation.
//!
//! [`insert_tree`] descends from the given page to the target leaf and
//! inserts there. When a page has no room, it splits and hands the
//! promoted separator back up as an [`InternalItem`]; each internal
//! level inserts the item it receives and may split in turn. A split of
//! the tree's root surfaces as `Some(item)` from the outermost call and
//! is resolved by [`crate::btree::BTreeIndex`] growing the tree in
//! place.
//!
//! The parent's write guard stays held across the recursion into the
//! child, so the parent-child pair is pinned together mid-transition.
//! Tree-structure writers are externally serialized; this module
//! assumes single-writer discipline.

use tracing::debug;

use crate::btree::key::{KeyDescriptor, KeyValue};
use crate::btree::layout::{
    encode_internal_entry, encode_leaf_entry, leaf_entry_len, page_kind, InternalView,
    InternalViewMut, LeafPayload, LeafView, LeafViewMut, OverflowViewMut, PageKind,
    OVERFLOW_MARKER, OVERFLOW_THRESHOLD, SLOT_SIZE,
};
use crate::btree::search::{search_internal, search_leaf};
use crate::btree::split::{split_internal, split_leaf};
use crate::buffer::{BufferPool, PageWriteGuard};
use crate::common::{Error, ObjectId, PageId, Result, NO_PAGE};

/// Separator promoted out of a split: the new right sibling and the key
/// delimiting it from the left page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalItem {
    /// Page number of the new right sibling.
    pub child: u32,
    /// Separator key; keys >= this route to `child`.
    pub key: KeyValue,
}

/// Insert `key -> oid` into the subtree rooted at `page_id`.
///
/// Returns `Some(item)` when `page_id` itself split and its parent must
/// absorb the promoted separator. A page allocated for the insert and
/// then stranded by a later failure is appended to `dealloc`.
pub(crate) fn insert_tree(
    pool: &BufferPool,
    desc: &KeyDescriptor,
    page_id: PageId,
    key: &KeyValue,
    oid: ObjectId,
    dealloc: &mut Vec<PageId>,
) -> Result<Option<InternalItem>> {
    let mut guard = pool.fetch_page_write(page_id)?;
    match page_kind(guard.as_slice()) {
        PageKind::Leaf => insert_leaf(pool, desc, &mut guard, key, oid, dealloc),
        PageKind::Internal => {
            let child_no = {
                let view = InternalView::new(guard.as_slice(), page_id)?;
                match search_internal(desc, &view, key.as_bytes())? {
                    None => view.leftmost_child(),
                    Some(i) => view.child_at(i),
                }
            };
            match insert_tree(pool, desc, page_id.same_volume(child_no), key, oid, dealloc)? {
                None => Ok(None),
                Some(item) => insert_internal(pool, desc, &mut guard, item),
            }
        }
        _ => Err(Error::BadPageType {
            page: page_id,
            expected: "leaf or internal",
            found: guard.as_slice()[0],
        }),
    }
}

/// Insert into a leaf page, spilling oversized entries into an overflow
/// chain and splitting when the page is full.
fn insert_leaf(
    pool: &BufferPool,
    desc: &KeyDescriptor,
    guard: &mut PageWriteGuard<'_>,
    key: &KeyValue,
    oid: ObjectId,
    dealloc: &mut Vec<PageId>,
) -> Result<Option<InternalItem>> {
    let page_id = guard.page_id();
    let hit = {
        let view = LeafView::new(guard.as_slice(), page_id)?;
        search_leaf(desc, &view, key.as_bytes())?
    };
    if hit.found {
        return Err(Error::DuplicateKey);
    }

    // Entries too large to share a page three ways keep their key
    // inline but move the object payload into an overflow chain.
    let (object_count, payload, overflow_page) = if leaf_entry_len(key.len()) > OVERFLOW_THRESHOLD {
        let mut ov_guard = pool.new_page()?;
        let ov_id = ov_guard.page_id();
        let mut ov = OverflowViewMut::init(ov_guard.as_mut_slice(), NO_PAGE);
        ov.push_oid(oid);
        debug!(leaf = %page_id, overflow = ov_id.page_no, "spilled oversized entry into overflow chain");
        (
            OVERFLOW_MARKER,
            LeafPayload::Overflow(ov_id.page_no),
            Some(ov_id),
        )
    } else {
        (1, LeafPayload::Inline(oid), None)
    };

    let entry = encode_leaf_entry(object_count, key.as_bytes(), payload);
    let needed = entry.len() + SLOT_SIZE;

    let (total, contiguous) = {
        let view = LeafView::new(guard.as_slice(), page_id)?;
        (view.total_free(), view.contiguous_free())
    };

    let outcome = if total >= needed {
        LeafViewMut::new(guard.as_mut_slice(), page_id).map(|mut leaf| {
            if contiguous < needed {
                leaf.compact();
            }
            leaf.insert_entry_slot(hit.index, &entry);
            None
        })
    } else {
        split_leaf(pool, guard, hit.index, &entry).map(Some)
    };

    // A failed insert must not strand the chain head it just allocated;
    // hand the page back for reclamation.
    if outcome.is_err() {
        if let Some(ov_id) = overflow_page {
            dealloc.push(ov_id);
        }
    }
    outcome
}

/// Absorb a separator promoted from a child, splitting this internal
/// page if it has no room.
fn insert_internal(
    pool: &BufferPool,
    desc: &KeyDescriptor,
    guard: &mut PageWriteGuard<'_>,
    item: InternalItem,
) -> Result<Option<InternalItem>> {
    let page_id = guard.page_id();
    let (idx, total, contiguous) = {
        let view = InternalView::new(guard.as_slice(), page_id)?;
        let idx = match search_internal(desc, &view, item.key.as_bytes())? {
            None => 0,
            Some(i) => i + 1,
        };
        (idx, view.total_free(), view.contiguous_free())
    };

    let entry = encode_internal_entry(item.child, item.key.as_bytes());
    let needed = entry.len() + SLOT_SIZE;

    if total >= needed {
        let mut page = InternalViewMut::new(guard.as_mut_slice(), page_id)?;
        if contiguous < needed {
            page.compact();
        }
        page.insert_entry_slot(idx, &entry);
        Ok(None)
    } else {
        Ok(Some(split_internal(pool, guard, idx, &item)?))
    }
}
