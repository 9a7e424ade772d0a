//! Scan establishment and ordered traversal over the leaf chain.
//!
//! A scan is a pair of calls: [`fetch`] descends from the root and
//! positions a cursor according to a start condition, then repeated
//! [`fetch_next`] calls walk the doubly-linked leaf chain one entry at
//! a time. The comparison operator names the terminal boundary of the
//! scan, which fixes the walk direction: `LessThan`/`LessOrEqual`/
//! `ToEnd` walk toward higher keys, `GreaterThan`/`GreaterOrEqual`/
//! `FromStart` toward lower keys. `Equal` has at most one match, so the
//! step after it is always `EndOfScan`.
//!
//! `EndOfScan` is absorbing: once a scan is exhausted every further
//! `fetch_next` returns `EndOfScan` again, whatever the stop condition.
//!
//! At most one leaf is pinned at a time while walking; each page is
//! released before its neighbor is acquired. Descriptor capability
//! checks are re-run here on every call — navigation is a separate
//! door into the engine from insertion.

use std::cmp::Ordering;

use crate::btree::key::{key_compare, KeyDescriptor, KeyValue};
use crate::btree::layout::{page_kind, InternalView, LeafPayload, LeafView, OverflowView, PageKind};
use crate::btree::search::{search_internal, search_leaf};
use crate::buffer::{BufferPool, PageReadGuard};
use crate::common::{Error, ObjectId, PageId, Result};

/// Comparison operator bounding a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    /// Recognized by the catalog but meaningless as a scan bound;
    /// always rejected with [`Error::BadCompareOp`].
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    /// Unbounded ascending walk to the end of the index.
    ToEnd,
    /// Unbounded descending walk to the start of the index.
    FromStart,
}

impl CompareOp {
    /// Whether the walk moves toward higher keys.
    fn forward(self) -> bool {
        matches!(
            self,
            CompareOp::LessThan | CompareOp::LessOrEqual | CompareOp::ToEnd
        )
    }

    /// Whether this operator needs a key to compare against.
    fn needs_key(self) -> bool {
        !matches!(self, CompareOp::ToEnd | CompareOp::FromStart)
    }
}

/// A saved position within a leaf, plus a snapshot of the entry there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPos {
    /// Leaf page holding the entry.
    pub leaf: PageId,
    /// Logical slot within that leaf.
    pub slot: usize,
    /// Key at the position when it was read.
    pub key: KeyValue,
    /// First object associated with the key.
    pub oid: ObjectId,
}

/// Scan cursor state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BtreeCursor {
    /// On a live entry.
    Positioned(CursorPos),
    /// Scan exhausted; terminal and absorbing.
    EndOfScan,
}

impl BtreeCursor {
    pub fn is_end(&self) -> bool {
        matches!(self, BtreeCursor::EndOfScan)
    }

    /// The position, if the cursor is on one.
    pub fn pos(&self) -> Option<&CursorPos> {
        match self {
            BtreeCursor::Positioned(pos) => Some(pos),
            BtreeCursor::EndOfScan => None,
        }
    }
}

/// Leaf header fields needed while walking the chain.
struct LeafMeta {
    count: usize,
    next: Option<u32>,
    prev: Option<u32>,
}

fn leaf_meta(guard: &PageReadGuard<'_>) -> Result<LeafMeta> {
    let view = LeafView::new(guard.as_slice(), guard.page_id())?;
    Ok(LeafMeta {
        count: view.slot_count(),
        next: view.next_page(),
        prev: view.prev_page(),
    })
}

/// Walk the leaf chain from (`guard`, `idx`) until `idx` denotes a live
/// slot, hopping siblings in the given direction. Returns the settled
/// page and slot, or `None` when the chain runs out.
fn settle<'a>(
    pool: &'a BufferPool,
    mut guard: PageReadGuard<'a>,
    mut idx: isize,
    forward: bool,
) -> Result<Option<(PageReadGuard<'a>, usize)>> {
    let mut meta = leaf_meta(&guard)?;
    loop {
        if idx >= 0 && (idx as usize) < meta.count {
            return Ok(Some((guard, idx as usize)));
        }
        let hop = if forward { meta.next } else { meta.prev };
        let Some(page_no) = hop else {
            return Ok(None);
        };
        let next_id = guard.page_id().same_volume(page_no);
        drop(guard);
        guard = pool.fetch_page_read(next_id)?;
        meta = leaf_meta(&guard)?;
        idx = if forward { 0 } else { meta.count as isize - 1 };
    }
}

/// Read the entry at `slot`, resolving an overflow payload to its first
/// ObjectId. Consumes the guard so only one page is pinned at a time.
fn read_entry(
    pool: &BufferPool,
    guard: PageReadGuard<'_>,
    slot: usize,
) -> Result<(PageId, KeyValue, ObjectId)> {
    let leaf_id = guard.page_id();
    let (key, payload) = {
        let view = LeafView::new(guard.as_slice(), leaf_id)?;
        (KeyValue::from_bytes(view.key_at(slot).to_vec()), view.payload_at(slot))
    };
    let oid = match payload {
        LeafPayload::Inline(oid) => oid,
        LeafPayload::Overflow(page_no) => {
            let ov_id = leaf_id.same_volume(page_no);
            drop(guard);
            let ov_guard = pool.fetch_page_read(ov_id)?;
            let view = OverflowView::new(ov_guard.as_slice(), ov_id)?;
            view.oid_at(0)
        }
    };
    Ok((leaf_id, key, oid))
}

/// Descend from `root` to the leaf that would hold `key`.
fn descend_to_leaf<'a>(
    pool: &'a BufferPool,
    desc: &KeyDescriptor,
    root: PageId,
    key: &[u8],
) -> Result<PageReadGuard<'a>> {
    let mut page_id = root;
    let mut guard = pool.fetch_page_read(page_id)?;
    loop {
        match page_kind(guard.as_slice()) {
            PageKind::Leaf => return Ok(guard),
            PageKind::Internal => {
                let child_no = {
                    let view = InternalView::new(guard.as_slice(), page_id)?;
                    match search_internal(desc, &view, key)? {
                        None => view.leftmost_child(),
                        Some(i) => view.child_at(i),
                    }
                };
                let child_id = page_id.same_volume(child_no);
                drop(guard);
                guard = pool.fetch_page_read(child_id)?;
                page_id = child_id;
            }
            _ => {
                return Err(Error::BadPageType {
                    page: page_id,
                    expected: "leaf or internal",
                    found: guard.as_slice()[0],
                })
            }
        }
    }
}

/// Descend along the leftmost (`forward`) or rightmost edge of the
/// tree, for scans with no start key.
fn descend_to_edge<'a>(
    pool: &'a BufferPool,
    root: PageId,
    leftmost: bool,
) -> Result<PageReadGuard<'a>> {
    let mut page_id = root;
    let mut guard = pool.fetch_page_read(page_id)?;
    loop {
        match page_kind(guard.as_slice()) {
            PageKind::Leaf => return Ok(guard),
            PageKind::Internal => {
                let child_no = {
                    let view = InternalView::new(guard.as_slice(), page_id)?;
                    if leftmost || view.slot_count() == 0 {
                        view.leftmost_child()
                    } else {
                        view.child_at(view.slot_count() - 1)
                    }
                };
                let child_id = page_id.same_volume(child_no);
                drop(guard);
                guard = pool.fetch_page_read(child_id)?;
                page_id = child_id;
            }
            _ => {
                return Err(Error::BadPageType {
                    page: page_id,
                    expected: "leaf or internal",
                    found: guard.as_slice()[0],
                })
            }
        }
    }
}

/// Establish a cursor at the first entry satisfying the start
/// condition `(key, op)`:
/// - `Equal`: the matching entry, or `EndOfScan` if absent;
/// - `LessThan`/`LessOrEqual`: the largest entry below / at the key;
/// - `GreaterThan`/`GreaterOrEqual`: the smallest entry above / at it;
/// - `ToEnd`: the index's first entry; `FromStart`: its last.
pub fn fetch(
    pool: &BufferPool,
    desc: &KeyDescriptor,
    root: PageId,
    key: Option<&KeyValue>,
    op: CompareOp,
) -> Result<BtreeCursor> {
    desc.validate()?;
    if op == CompareOp::NotEqual {
        return Err(Error::BadCompareOp);
    }
    if op.needs_key() && key.is_none() {
        return Err(Error::BadParameter("start condition requires a key"));
    }

    let (guard, idx) = match op {
        CompareOp::ToEnd => (descend_to_edge(pool, root, true)?, 0isize),
        CompareOp::FromStart => {
            let guard = descend_to_edge(pool, root, false)?;
            let count = leaf_meta(&guard)?.count;
            (guard, count as isize - 1)
        }
        _ => {
            let key_bytes = key.map(KeyValue::as_bytes).unwrap_or_default();
            let guard = descend_to_leaf(pool, desc, root, key_bytes)?;
            let hit = {
                let view = LeafView::new(guard.as_slice(), guard.page_id())?;
                search_leaf(desc, &view, key_bytes)?
            };
            let idx = match op {
                CompareOp::Equal => {
                    if !hit.found {
                        return Ok(BtreeCursor::EndOfScan);
                    }
                    hit.index as isize
                }
                // First entry >= the key, or just past it.
                CompareOp::GreaterOrEqual => hit.index as isize,
                CompareOp::GreaterThan => hit.index as isize + if hit.found { 1 } else { 0 },
                // Last entry <= / < the key.
                CompareOp::LessOrEqual => hit.index as isize - if hit.found { 0 } else { 1 },
                CompareOp::LessThan => hit.index as isize - 1,
                _ => unreachable!("handled above"),
            };
            (guard, idx)
        }
    };

    // A start position past either end of a leaf resolves through the
    // sibling chain: GreaterThan past the last slot means the next
    // leaf's first entry, and symmetrically for the Less ops.
    let toward_higher = matches!(
        op,
        CompareOp::GreaterThan | CompareOp::GreaterOrEqual | CompareOp::ToEnd | CompareOp::Equal
    );
    let Some((guard, slot)) = settle(pool, guard, idx, toward_higher)? else {
        return Ok(BtreeCursor::EndOfScan);
    };
    let (leaf, key, oid) = read_entry(pool, guard, slot)?;
    Ok(BtreeCursor::Positioned(CursorPos {
        leaf,
        slot,
        key,
        oid,
    }))
}

/// Advance a cursor one entry in the scan's direction and test it
/// against the stop condition `(stop_key, op)`.
///
/// The candidate entry is fully decoded before the stop test runs;
/// when the test fails the candidate is discarded and the result is
/// `EndOfScan`.
pub fn fetch_next(
    pool: &BufferPool,
    desc: &KeyDescriptor,
    stop_key: Option<&KeyValue>,
    op: CompareOp,
    current: &BtreeCursor,
) -> Result<BtreeCursor> {
    desc.validate()?;
    if op == CompareOp::NotEqual {
        return Err(Error::BadCompareOp);
    }
    if op.needs_key() && op != CompareOp::Equal && stop_key.is_none() {
        return Err(Error::BadParameter("stop condition requires a key"));
    }

    let BtreeCursor::Positioned(pos) = current else {
        return Ok(BtreeCursor::EndOfScan);
    };
    // At most one entry matches an Equal condition, and the cursor is
    // already on it.
    if op == CompareOp::Equal {
        return Ok(BtreeCursor::EndOfScan);
    }

    let guard = pool.fetch_page_read(pos.leaf)?;
    if page_kind(guard.as_slice()) != PageKind::Leaf {
        return Err(Error::BadCursor);
    }

    // Re-anchor on the saved key rather than trusting the saved slot:
    // inserts since the last call may have shifted entries or split the
    // leaf.
    let hit = {
        let view = LeafView::new(guard.as_slice(), pos.leaf)?;
        search_leaf(desc, &view, pos.key.as_bytes())?
    };
    let forward = op.forward();
    let idx = if forward {
        hit.index as isize + if hit.found { 1 } else { 0 }
    } else {
        hit.index as isize - 1
    };

    let Some((mut guard, mut slot)) = settle(pool, guard, idx, forward)? else {
        return Ok(BtreeCursor::EndOfScan);
    };

    // A split may have moved the saved key (and keys adjacent to it)
    // off the saved leaf entirely, in which case the hop above lands at
    // a sibling edge that is not past the saved key yet. Keep stepping
    // until the candidate lies strictly beyond it in the walk
    // direction.
    loop {
        let ord = {
            let view = LeafView::new(guard.as_slice(), guard.page_id())?;
            key_compare(desc, view.key_at(slot), pos.key.as_bytes())?
        };
        let beyond = if forward {
            ord == Ordering::Greater
        } else {
            ord == Ordering::Less
        };
        if beyond {
            break;
        }
        let step = if forward {
            slot as isize + 1
        } else {
            slot as isize - 1
        };
        match settle(pool, guard, step, forward)? {
            Some((g, s)) => {
                guard = g;
                slot = s;
            }
            None => return Ok(BtreeCursor::EndOfScan),
        }
    }
    let (leaf, key, oid) = read_entry(pool, guard, slot)?;

    let satisfied = match op {
        CompareOp::ToEnd | CompareOp::FromStart => true,
        _ => {
            let stop = stop_key.map(KeyValue::as_bytes).unwrap_or_default();
            let ord = key_compare(desc, key.as_bytes(), stop)?;
            match op {
                CompareOp::LessThan => ord == Ordering::Less,
                CompareOp::LessOrEqual => ord != Ordering::Greater,
                CompareOp::GreaterThan => ord == Ordering::Greater,
                CompareOp::GreaterOrEqual => ord != Ordering::Less,
                _ => unreachable!("handled above"),
            }
        }
    };

    if satisfied {
        Ok(BtreeCursor::Positioned(CursorPos {
            leaf,
            slot,
            key,
            oid,
        }))
    } else {
        Ok(BtreeCursor::EndOfScan)
    }
}
