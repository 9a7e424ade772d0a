//! Disk-resident B+-tree index.
//!
//! Keys live in sorted order across a doubly-linked chain of leaf
//! pages; internal pages route by separator key. All entries carry an
//! opaque [`ObjectId`] payload. The tree supports insertion (with
//! duplicate rejection) and ordered forward/backward scans via
//! cursors.
//!
//! The root page's identity never changes: when the root splits, its
//! old contents move to a fresh page and the root is rebuilt in place
//! as an internal page over the two halves, so callers can hold the
//! root [`PageId`] indefinitely.
//!
//! # Module layout
//! - [`key`] — key descriptors, encoding, and comparison
//! - [`layout`] — physical leaf/internal/overflow page formats
//! - [`search`] — in-page binary search
//! - [`insert`] / `split` — recursive insertion and page splits
//! - [`cursor`] — scan establishment and traversal

pub mod cursor;
pub mod insert;
pub mod key;
pub mod layout;
pub mod search;
mod split;

pub use cursor::{BtreeCursor, CompareOp, CursorPos};
pub use insert::InternalItem;
pub use key::{KeyBuilder, KeyDescriptor, KeyPart, KeyType, KeyValue};

use tracing::debug;

use crate::btree::insert::insert_tree;
use crate::btree::key::validate_key;
use crate::btree::layout::{encode_internal_entry, page_kind, InternalViewMut, LeafViewMut, PageKind};
use crate::buffer::BufferPool;
use crate::common::{ObjectId, PageId, Result, NO_PAGE};

/// Handle to one B-tree rooted at a fixed page.
///
/// The handle borrows the buffer pool and owns nothing on disk; opening
/// the same root through two handles is allowed for readers. Structural
/// modification requires external single-writer discipline.
pub struct BTreeIndex<'a> {
    pool: &'a BufferPool,
    root: PageId,
    desc: KeyDescriptor,
}

impl<'a> BTreeIndex<'a> {
    /// Create a new empty tree, allocating its root leaf.
    pub fn create(pool: &'a BufferPool, desc: KeyDescriptor) -> Result<Self> {
        desc.validate()?;
        let mut guard = pool.new_page()?;
        let root = guard.page_id();
        LeafViewMut::init(guard.as_mut_slice(), NO_PAGE, NO_PAGE);
        drop(guard);
        debug!(root = %root, "created index");
        Ok(Self { pool, root, desc })
    }

    /// Open an existing tree by its root page.
    pub fn open(pool: &'a BufferPool, root: PageId, desc: KeyDescriptor) -> Result<Self> {
        desc.validate()?;
        Ok(Self { pool, root, desc })
    }

    /// Root page of this tree. Stable across splits.
    #[inline]
    pub fn root(&self) -> PageId {
        self.root
    }

    /// Key descriptor this tree was built with.
    #[inline]
    pub fn descriptor(&self) -> &KeyDescriptor {
        &self.desc
    }

    /// Insert `key -> oid`, rejecting duplicates.
    ///
    /// Pages released by structural changes are appended to `dealloc`
    /// for the caller's allocator to reclaim. A successful insert only
    /// ever allocates; the list receives a page when a failed split
    /// strands a freshly created overflow chain.
    pub fn insert(
        &self,
        key: &KeyValue,
        oid: ObjectId,
        dealloc: &mut Vec<PageId>,
    ) -> Result<()> {
        self.desc.validate()?;
        validate_key(&self.desc, key)?;

        if let Some(item) = insert_tree(self.pool, &self.desc, self.root, key, oid, dealloc)? {
            self.grow_root(item)?;
        }
        Ok(())
    }

    /// Establish a cursor at the first entry satisfying `(key, op)`.
    /// See [`cursor::fetch`].
    pub fn fetch(&self, key: Option<&KeyValue>, op: CompareOp) -> Result<BtreeCursor> {
        cursor::fetch(self.pool, &self.desc, self.root, key, op)
    }

    /// Advance `current` one entry and test it against `(stop_key, op)`.
    /// See [`cursor::fetch_next`].
    pub fn fetch_next(
        &self,
        stop_key: Option<&KeyValue>,
        op: CompareOp,
        current: &BtreeCursor,
    ) -> Result<BtreeCursor> {
        cursor::fetch_next(self.pool, &self.desc, stop_key, op, current)
    }

    /// Absorb a root split by growing the tree a level, in place.
    ///
    /// The old root's bytes move to a fresh page and the root is
    /// reinitialized as an internal page whose `leftmost_child` is the
    /// moved copy. When the old root was a leaf, the new right
    /// sibling's back pointer is restitched to the moved copy.
    fn grow_root(&self, item: InternalItem) -> Result<()> {
        let mut root_guard = self.pool.fetch_page_write(self.root)?;

        let mut moved_guard = self.pool.new_page()?;
        let moved_no = moved_guard.page_id().page_no;
        moved_guard
            .as_mut_slice()
            .copy_from_slice(root_guard.as_slice());
        let moved_is_leaf = page_kind(moved_guard.as_slice()) == PageKind::Leaf;
        drop(moved_guard);

        {
            let mut root = InternalViewMut::init(root_guard.as_mut_slice(), moved_no);
            root.insert_entry_slot(0, &encode_internal_entry(item.child, item.key.as_bytes()));
        }
        drop(root_guard);

        if moved_is_leaf {
            let mut sibling = self.pool.fetch_page_write(self.root.same_volume(item.child))?;
            let sibling_id = sibling.page_id();
            LeafViewMut::new(sibling.as_mut_slice(), sibling_id)?.set_prev_page(moved_no);
        }

        debug!(root = %self.root, moved = moved_no, right = item.child, "grew tree height");
        Ok(())
    }
}
