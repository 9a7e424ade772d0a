//! Physical page formats for the B-tree: leaf, internal, and overflow
//! pages.
//!
//! This is the only module that computes raw byte offsets into a page.
//! Everything else addresses entries by logical slot index through the
//! view types defined here.
//!
//! # Common prefix (all kinds)
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     kind (PageKind as u8)
//! 1       1     reserved
//! 2       4     CRC32 checksum (owned by the storage layer)
//! ```
//!
//! # Leaf page (header 20 bytes)
//! ```text
//! 6       2     slot_count
//! 8       2     free (offset of the entry-area free-space cursor)
//! 10      2     unused (bytes lost to fragmentation)
//! 12      4     prev_page (NO_PAGE if none)
//! 16      4     next_page (NO_PAGE if none)
//! ```
//! Leaf entry: `object_count u16, key_len u16, key bytes (padded to
//! KEY_ALIGNMENT), payload 8 bytes`. The payload is an inline ObjectId,
//! or — when `object_count == OVERFLOW_MARKER` — the page number of the
//! entry's overflow chain head.
//!
//! # Internal page (header 16 bytes)
//! ```text
//! 6       2     slot_count
//! 8       2     free
//! 10      2     unused
//! 12      4     leftmost_child
//! ```
//! Internal entry: `child u32, key_len u16, key bytes (padded)`. For
//! slot i, keys in entry i's child subtree are >= entry i's key and
//! < entry i+1's key; keys below entry 0's key route to leftmost_child.
//!
//! # Overflow page (header 12 bytes)
//! ```text
//! 6       2     count
//! 8       4     next_page (NO_PAGE if none)
//! ```
//! followed by `count` 8-byte ObjectIds.
//!
//! # Slot directory (leaf and internal)
//! u16 entry offsets stored from the end of the page growing downward:
//! slot i occupies bytes `PAGE_SIZE - 2*(i+1) .. PAGE_SIZE - 2*i`.
//! Logical slot order is ascending key order.

use tracing::trace;

use crate::common::config::{aligned_key_len, MAX_KEY_LEN, PAGE_SIZE};
use crate::common::{Error, ObjectId, PageId, Result, NO_PAGE};

/// Size of one slot-directory cell.
pub const SLOT_SIZE: usize = 2;

/// Leaf page header size.
pub const LEAF_HEADER_SIZE: usize = 20;

/// Internal page header size.
pub const INTERNAL_HEADER_SIZE: usize = 16;

/// Overflow page header size.
pub const OVERFLOW_HEADER_SIZE: usize = 12;

/// `object_count` value marking a leaf entry whose payload lives in an
/// overflow chain.
pub const OVERFLOW_MARKER: u16 = u16::MAX;

/// Space usable by entries and slots on a leaf page.
pub const LEAF_USABLE: usize = PAGE_SIZE - LEAF_HEADER_SIZE;

/// Space usable by entries and slots on an internal page.
pub const INTERNAL_USABLE: usize = PAGE_SIZE - INTERNAL_HEADER_SIZE;

/// An entry larger than this is redirected into an overflow chain.
pub const OVERFLOW_THRESHOLD: usize = LEAF_USABLE / 3;

const OFF_KIND: usize = 0;
const OFF_SLOT_COUNT: usize = 6;
const OFF_FREE: usize = 8;
const OFF_UNUSED: usize = 10;
const OFF_LEAF_PREV: usize = 12;
const OFF_LEAF_NEXT: usize = 16;
const OFF_LEFTMOST: usize = 12;
const OFF_OV_COUNT: usize = 6;
const OFF_OV_NEXT: usize = 8;

/// Kind of B-tree page, stored in byte 0 of every page.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Uninitialized page.
    #[default]
    Invalid = 0,
    /// Bottom-level page holding sorted key -> object associations.
    Leaf = 1,
    /// Routing page holding separator keys and child pointers.
    Internal = 2,
    /// Auxiliary page holding an entry's spilled ObjectIds.
    Overflow = 3,
}

impl PageKind {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageKind::Leaf,
            2 => PageKind::Internal,
            3 => PageKind::Overflow,
            _ => PageKind::Invalid,
        }
    }
}

/// Read the kind byte of a page.
#[inline]
pub fn page_kind(data: &[u8]) -> PageKind {
    PageKind::from_u8(data[OFF_KIND])
}

// ============================================================================
// Raw field helpers (private)
// ============================================================================

#[inline]
fn get_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

#[inline]
fn put_u16(data: &mut [u8], off: usize, v: u16) {
    data[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn get_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

#[inline]
fn put_u32(data: &mut [u8], off: usize, v: u32) {
    data[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn slot_get(data: &[u8], i: usize) -> u16 {
    get_u16(data, PAGE_SIZE - SLOT_SIZE * (i + 1))
}

#[inline]
fn slot_put(data: &mut [u8], i: usize, v: u16) {
    put_u16(data, PAGE_SIZE - SLOT_SIZE * (i + 1), v);
}

// ============================================================================
// Entry encoding
// ============================================================================

/// Payload of a leaf entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafPayload {
    /// ObjectId stored inline in the entry.
    Inline(ObjectId),
    /// Page number of the overflow chain holding the ObjectIds.
    Overflow(u32),
}

impl LeafPayload {
    fn to_bytes(self) -> [u8; 8] {
        match self {
            LeafPayload::Inline(oid) => oid.to_bytes(),
            LeafPayload::Overflow(page_no) => {
                let mut buf = [0u8; 8];
                buf[0..4].copy_from_slice(&page_no.to_le_bytes());
                buf
            }
        }
    }
}

/// Byte length of a leaf entry for a key of `klen` bytes.
#[inline]
pub const fn leaf_entry_len(klen: usize) -> usize {
    4 + aligned_key_len(klen) + ObjectId::SIZE
}

/// Byte length of an internal entry for a key of `klen` bytes.
#[inline]
pub const fn internal_entry_len(klen: usize) -> usize {
    4 + 2 + aligned_key_len(klen)
}

// An entry plus its slot stays below half the usable area, so a split
// can always partition the merged sequence with both halves fitting a
// page.
const _: () = assert!(leaf_entry_len(MAX_KEY_LEN) + SLOT_SIZE <= LEAF_USABLE / 2);
const _: () = assert!(internal_entry_len(MAX_KEY_LEN) + SLOT_SIZE <= INTERNAL_USABLE / 2);

/// Encode a leaf entry. `object_count` is OVERFLOW_MARKER for
/// overflow-backed entries.
pub fn encode_leaf_entry(object_count: u16, key: &[u8], payload: LeafPayload) -> Vec<u8> {
    let aligned = aligned_key_len(key.len());
    let mut buf = vec![0u8; leaf_entry_len(key.len())];
    buf[0..2].copy_from_slice(&object_count.to_le_bytes());
    buf[2..4].copy_from_slice(&(key.len() as u16).to_le_bytes());
    buf[4..4 + key.len()].copy_from_slice(key);
    buf[4 + aligned..].copy_from_slice(&payload.to_bytes());
    buf
}

/// Encode an internal entry.
pub fn encode_internal_entry(child: u32, key: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; internal_entry_len(key.len())];
    buf[0..4].copy_from_slice(&child.to_le_bytes());
    buf[4..6].copy_from_slice(&(key.len() as u16).to_le_bytes());
    buf[6..6 + key.len()].copy_from_slice(key);
    buf
}

// ============================================================================
// Leaf page views
// ============================================================================

/// Read-only view over a leaf page's bytes.
#[derive(Clone, Copy)]
pub struct LeafView<'a> {
    data: &'a [u8],
}

impl<'a> LeafView<'a> {
    /// Wrap a page, verifying its kind.
    pub fn new(data: &'a [u8], page: PageId) -> Result<Self> {
        if page_kind(data) != PageKind::Leaf {
            return Err(Error::BadPageType {
                page,
                expected: "leaf",
                found: data[OFF_KIND],
            });
        }
        Ok(Self { data })
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        get_u16(self.data, OFF_SLOT_COUNT) as usize
    }

    #[inline]
    pub fn free_offset(&self) -> usize {
        get_u16(self.data, OFF_FREE) as usize
    }

    #[inline]
    pub fn unused(&self) -> usize {
        get_u16(self.data, OFF_UNUSED) as usize
    }

    /// Previous-leaf page number, None at the chain's left end.
    pub fn prev_page(&self) -> Option<u32> {
        match get_u32(self.data, OFF_LEAF_PREV) {
            NO_PAGE => None,
            n => Some(n),
        }
    }

    /// Next-leaf page number, None at the chain's right end.
    pub fn next_page(&self) -> Option<u32> {
        match get_u32(self.data, OFF_LEAF_NEXT) {
            NO_PAGE => None,
            n => Some(n),
        }
    }

    /// Free space usable without compaction.
    pub fn contiguous_free(&self) -> usize {
        PAGE_SIZE - SLOT_SIZE * self.slot_count() - self.free_offset()
    }

    /// True free space (contiguous plus fragmented).
    pub fn total_free(&self) -> usize {
        self.contiguous_free() + self.unused()
    }

    fn entry_offset(&self, idx: usize) -> usize {
        debug_assert!(idx < self.slot_count());
        slot_get(self.data, idx) as usize
    }

    /// Object count field of the entry at the given logical slot.
    pub fn object_count_at(&self, idx: usize) -> u16 {
        get_u16(self.data, self.entry_offset(idx))
    }

    /// Encoded key bytes of the entry at the given logical slot.
    pub fn key_at(&self, idx: usize) -> &'a [u8] {
        let off = self.entry_offset(idx);
        let klen = get_u16(self.data, off + 2) as usize;
        &self.data[off + 4..off + 4 + klen]
    }

    /// Payload of the entry at the given logical slot.
    pub fn payload_at(&self, idx: usize) -> LeafPayload {
        let off = self.entry_offset(idx);
        let klen = get_u16(self.data, off + 2) as usize;
        let poff = off + 4 + aligned_key_len(klen);
        if self.object_count_at(idx) == OVERFLOW_MARKER {
            LeafPayload::Overflow(get_u32(self.data, poff))
        } else {
            LeafPayload::Inline(ObjectId::from_bytes(&self.data[poff..poff + 8]))
        }
    }

    /// Byte length of the entry at the given logical slot.
    pub fn entry_len_at(&self, idx: usize) -> usize {
        let off = self.entry_offset(idx);
        leaf_entry_len(get_u16(self.data, off + 2) as usize)
    }

    /// Raw bytes of the entry at the given logical slot.
    pub fn entry_bytes_at(&self, idx: usize) -> &'a [u8] {
        let off = self.entry_offset(idx);
        &self.data[off..off + self.entry_len_at(idx)]
    }
}

/// Mutable view over a leaf page's bytes.
pub struct LeafViewMut<'a> {
    data: &'a mut [u8],
}

impl<'a> LeafViewMut<'a> {
    /// Wrap an existing leaf page, verifying its kind.
    pub fn new(data: &'a mut [u8], page: PageId) -> Result<Self> {
        if page_kind(data) != PageKind::Leaf {
            return Err(Error::BadPageType {
                page,
                expected: "leaf",
                found: data[OFF_KIND],
            });
        }
        Ok(Self { data })
    }

    /// Initialize a page as an empty leaf.
    pub fn init(data: &'a mut [u8], prev: u32, next: u32) -> Self {
        data[OFF_KIND] = PageKind::Leaf as u8;
        put_u16(data, OFF_SLOT_COUNT, 0);
        put_u16(data, OFF_FREE, LEAF_HEADER_SIZE as u16);
        put_u16(data, OFF_UNUSED, 0);
        put_u32(data, OFF_LEAF_PREV, prev);
        put_u32(data, OFF_LEAF_NEXT, next);
        Self { data }
    }

    /// Read-only view of the same page.
    pub fn as_view(&self) -> LeafView<'_> {
        LeafView { data: self.data }
    }

    pub fn set_prev_page(&mut self, page_no: u32) {
        put_u32(self.data, OFF_LEAF_PREV, page_no);
    }

    pub fn set_next_page(&mut self, page_no: u32) {
        put_u32(self.data, OFF_LEAF_NEXT, page_no);
    }

    /// Insert an encoded entry at logical slot `idx`, shifting the slot
    /// directory at and after `idx` one position.
    ///
    /// The caller must have ensured `contiguous_free()` covers the entry
    /// plus one slot cell (compacting first if necessary).
    pub fn insert_entry_slot(&mut self, idx: usize, entry: &[u8]) {
        let n = self.as_view().slot_count();
        let free = self.as_view().free_offset();
        debug_assert!(idx <= n);
        debug_assert!(self.as_view().contiguous_free() >= entry.len() + SLOT_SIZE);

        self.data[free..free + entry.len()].copy_from_slice(entry);

        for i in (idx..n).rev() {
            let v = slot_get(self.data, i);
            slot_put(self.data, i + 1, v);
        }
        slot_put(self.data, idx, free as u16);

        put_u16(self.data, OFF_FREE, (free + entry.len()) as u16);
        put_u16(self.data, OFF_SLOT_COUNT, (n + 1) as u16);
    }

    /// Remove the entry at logical slot `idx`, leaving its bytes as a
    /// hole accounted in `unused`.
    pub fn remove_entry_slot(&mut self, idx: usize) {
        let n = self.as_view().slot_count();
        debug_assert!(idx < n);
        let len = self.as_view().entry_len_at(idx);

        for i in idx + 1..n {
            let v = slot_get(self.data, i);
            slot_put(self.data, i - 1, v);
        }

        let unused = self.as_view().unused();
        put_u16(self.data, OFF_UNUSED, (unused + len) as u16);
        put_u16(self.data, OFF_SLOT_COUNT, (n - 1) as u16);
    }

    /// Rewrite all live entries contiguously from the start of the
    /// entry area in slot order. Logical order and slot count are
    /// unchanged; afterwards `unused` is zero and all free space is
    /// contiguous.
    pub fn compact(&mut self) {
        let n = self.as_view().slot_count();

        let mut packed: Vec<u8> = Vec::with_capacity(PAGE_SIZE);
        let mut offsets: Vec<u16> = Vec::with_capacity(n);
        for i in 0..n {
            offsets.push((LEAF_HEADER_SIZE + packed.len()) as u16);
            packed.extend_from_slice(self.as_view().entry_bytes_at(i));
        }

        self.data[LEAF_HEADER_SIZE..LEAF_HEADER_SIZE + packed.len()].copy_from_slice(&packed);
        for (i, off) in offsets.iter().enumerate() {
            slot_put(self.data, i, *off);
        }
        put_u16(self.data, OFF_FREE, (LEAF_HEADER_SIZE + packed.len()) as u16);
        put_u16(self.data, OFF_UNUSED, 0);

        trace!(slots = n, "compacted leaf page");
    }
}

// ============================================================================
// Internal page views
// ============================================================================

/// Read-only view over an internal page's bytes.
#[derive(Clone, Copy)]
pub struct InternalView<'a> {
    data: &'a [u8],
}

impl<'a> InternalView<'a> {
    /// Wrap a page, verifying its kind.
    pub fn new(data: &'a [u8], page: PageId) -> Result<Self> {
        if page_kind(data) != PageKind::Internal {
            return Err(Error::BadPageType {
                page,
                expected: "internal",
                found: data[OFF_KIND],
            });
        }
        Ok(Self { data })
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        get_u16(self.data, OFF_SLOT_COUNT) as usize
    }

    #[inline]
    pub fn free_offset(&self) -> usize {
        get_u16(self.data, OFF_FREE) as usize
    }

    #[inline]
    pub fn unused(&self) -> usize {
        get_u16(self.data, OFF_UNUSED) as usize
    }

    /// Child holding keys below the first entry's key.
    #[inline]
    pub fn leftmost_child(&self) -> u32 {
        get_u32(self.data, OFF_LEFTMOST)
    }

    pub fn contiguous_free(&self) -> usize {
        PAGE_SIZE - SLOT_SIZE * self.slot_count() - self.free_offset()
    }

    pub fn total_free(&self) -> usize {
        self.contiguous_free() + self.unused()
    }

    fn entry_offset(&self, idx: usize) -> usize {
        debug_assert!(idx < self.slot_count());
        slot_get(self.data, idx) as usize
    }

    /// Child page number of the entry at the given logical slot.
    pub fn child_at(&self, idx: usize) -> u32 {
        get_u32(self.data, self.entry_offset(idx))
    }

    /// Encoded key bytes of the entry at the given logical slot.
    pub fn key_at(&self, idx: usize) -> &'a [u8] {
        let off = self.entry_offset(idx);
        let klen = get_u16(self.data, off + 4) as usize;
        &self.data[off + 6..off + 6 + klen]
    }

    /// Byte length of the entry at the given logical slot.
    pub fn entry_len_at(&self, idx: usize) -> usize {
        let off = self.entry_offset(idx);
        internal_entry_len(get_u16(self.data, off + 4) as usize)
    }

    /// Raw bytes of the entry at the given logical slot.
    pub fn entry_bytes_at(&self, idx: usize) -> &'a [u8] {
        let off = self.entry_offset(idx);
        &self.data[off..off + self.entry_len_at(idx)]
    }
}

/// Mutable view over an internal page's bytes.
pub struct InternalViewMut<'a> {
    data: &'a mut [u8],
}

impl<'a> InternalViewMut<'a> {
    /// Wrap an existing internal page, verifying its kind.
    pub fn new(data: &'a mut [u8], page: PageId) -> Result<Self> {
        if page_kind(data) != PageKind::Internal {
            return Err(Error::BadPageType {
                page,
                expected: "internal",
                found: data[OFF_KIND],
            });
        }
        Ok(Self { data })
    }

    /// Initialize a page as an empty internal page.
    pub fn init(data: &'a mut [u8], leftmost_child: u32) -> Self {
        data[OFF_KIND] = PageKind::Internal as u8;
        put_u16(data, OFF_SLOT_COUNT, 0);
        put_u16(data, OFF_FREE, INTERNAL_HEADER_SIZE as u16);
        put_u16(data, OFF_UNUSED, 0);
        put_u32(data, OFF_LEFTMOST, leftmost_child);
        Self { data }
    }

    /// Read-only view of the same page.
    pub fn as_view(&self) -> InternalView<'_> {
        InternalView { data: self.data }
    }

    pub fn set_leftmost_child(&mut self, page_no: u32) {
        put_u32(self.data, OFF_LEFTMOST, page_no);
    }

    /// Insert an encoded entry at logical slot `idx`; same contract as
    /// [`LeafViewMut::insert_entry_slot`].
    pub fn insert_entry_slot(&mut self, idx: usize, entry: &[u8]) {
        let n = self.as_view().slot_count();
        let free = self.as_view().free_offset();
        debug_assert!(idx <= n);
        debug_assert!(self.as_view().contiguous_free() >= entry.len() + SLOT_SIZE);

        self.data[free..free + entry.len()].copy_from_slice(entry);

        for i in (idx..n).rev() {
            let v = slot_get(self.data, i);
            slot_put(self.data, i + 1, v);
        }
        slot_put(self.data, idx, free as u16);

        put_u16(self.data, OFF_FREE, (free + entry.len()) as u16);
        put_u16(self.data, OFF_SLOT_COUNT, (n + 1) as u16);
    }

    /// Remove the entry at logical slot `idx`, leaving a hole accounted
    /// in `unused`.
    pub fn remove_entry_slot(&mut self, idx: usize) {
        let n = self.as_view().slot_count();
        debug_assert!(idx < n);
        let len = self.as_view().entry_len_at(idx);

        for i in idx + 1..n {
            let v = slot_get(self.data, i);
            slot_put(self.data, i - 1, v);
        }

        let unused = self.as_view().unused();
        put_u16(self.data, OFF_UNUSED, (unused + len) as u16);
        put_u16(self.data, OFF_SLOT_COUNT, (n - 1) as u16);
    }

    /// Rewrite all live entries contiguously; see
    /// [`LeafViewMut::compact`].
    pub fn compact(&mut self) {
        let n = self.as_view().slot_count();

        let mut packed: Vec<u8> = Vec::with_capacity(PAGE_SIZE);
        let mut offsets: Vec<u16> = Vec::with_capacity(n);
        for i in 0..n {
            offsets.push((INTERNAL_HEADER_SIZE + packed.len()) as u16);
            packed.extend_from_slice(self.as_view().entry_bytes_at(i));
        }

        self.data[INTERNAL_HEADER_SIZE..INTERNAL_HEADER_SIZE + packed.len()]
            .copy_from_slice(&packed);
        for (i, off) in offsets.iter().enumerate() {
            slot_put(self.data, i, *off);
        }
        put_u16(self.data, OFF_FREE, (INTERNAL_HEADER_SIZE + packed.len()) as u16);
        put_u16(self.data, OFF_UNUSED, 0);

        trace!(slots = n, "compacted internal page");
    }
}

// ============================================================================
// Overflow page views
// ============================================================================

/// Read-only view over an overflow page's bytes.
#[derive(Clone, Copy)]
pub struct OverflowView<'a> {
    data: &'a [u8],
}

impl<'a> OverflowView<'a> {
    /// Wrap a page, verifying its kind.
    pub fn new(data: &'a [u8], page: PageId) -> Result<Self> {
        if page_kind(data) != PageKind::Overflow {
            return Err(Error::BadPageType {
                page,
                expected: "overflow",
                found: data[OFF_KIND],
            });
        }
        Ok(Self { data })
    }

    /// Number of ObjectIds on this page.
    #[inline]
    pub fn count(&self) -> usize {
        get_u16(self.data, OFF_OV_COUNT) as usize
    }

    /// Next overflow page in the chain, None at the end.
    pub fn next_page(&self) -> Option<u32> {
        match get_u32(self.data, OFF_OV_NEXT) {
            NO_PAGE => None,
            n => Some(n),
        }
    }

    /// ObjectId at the given position.
    pub fn oid_at(&self, idx: usize) -> ObjectId {
        debug_assert!(idx < self.count());
        let off = OVERFLOW_HEADER_SIZE + idx * ObjectId::SIZE;
        ObjectId::from_bytes(&self.data[off..off + ObjectId::SIZE])
    }
}

/// Mutable view over an overflow page's bytes.
pub struct OverflowViewMut<'a> {
    data: &'a mut [u8],
}

impl<'a> OverflowViewMut<'a> {
    /// Initialize a page as an empty overflow page.
    pub fn init(data: &'a mut [u8], next: u32) -> Self {
        data[OFF_KIND] = PageKind::Overflow as u8;
        put_u16(data, OFF_OV_COUNT, 0);
        put_u32(data, OFF_OV_NEXT, next);
        Self { data }
    }

    /// Read-only view of the same page.
    pub fn as_view(&self) -> OverflowView<'_> {
        OverflowView { data: self.data }
    }

    /// Append an ObjectId.
    pub fn push_oid(&mut self, oid: ObjectId) {
        let n = self.as_view().count();
        let off = OVERFLOW_HEADER_SIZE + n * ObjectId::SIZE;
        debug_assert!(off + ObjectId::SIZE <= PAGE_SIZE);
        self.data[off..off + ObjectId::SIZE].copy_from_slice(&oid.to_bytes());
        put_u16(self.data, OFF_OV_COUNT, (n + 1) as u16);
    }
}

// ============================================================================
// TESTS
// ============================================================================
