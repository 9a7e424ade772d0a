//! Integration tests for B-tree insertion: ordering, splits, root
//! growth, and the validation boundary.

use arbordb::btree::layout::{
    self, InternalView, LeafView, LeafViewMut, PageKind, LEAF_USABLE, OVERFLOW_MARKER,
};
use arbordb::btree::{BTreeIndex, CompareOp, KeyDescriptor, KeyPart, KeyValue};
use arbordb::buffer::BufferPool;
use arbordb::common::{Error, ObjectId, VolumeId};
use arbordb::storage::DiskManager;
use tempfile::tempdir;

fn create_pool(frames: usize) -> (BufferPool, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("index.db"), VolumeId(0)).unwrap();
    (BufferPool::new(frames, dm), dir)
}

fn int_desc() -> KeyDescriptor {
    KeyDescriptor::new(vec![KeyPart::integer(4)])
}

fn ikey(v: i32) -> KeyValue {
    KeyValue::builder().push_i32(v).build()
}

fn oid(v: i32) -> ObjectId {
    ObjectId::new(v as u32, 0, 0)
}

fn decode_ikey(key: &KeyValue) -> i32 {
    i32::from_le_bytes(key.as_bytes().try_into().unwrap())
}

/// Walk the whole tree ascending and decode the integer keys.
fn collect_ascending(tree: &BTreeIndex<'_>) -> Vec<i32> {
    let mut out = Vec::new();
    let mut cur = tree.fetch(None, CompareOp::ToEnd).unwrap();
    while let Some(pos) = cur.pos() {
        out.push(decode_ikey(&pos.key));
        cur = tree.fetch_next(None, CompareOp::ToEnd, &cur).unwrap();
    }
    out
}

#[test]
fn test_insert_and_point_lookup() {
    let (pool, _dir) = create_pool(16);
    let tree = BTreeIndex::create(&pool, int_desc()).unwrap();
    let mut dealloc = Vec::new();

    for v in [42, 7, 99] {
        tree.insert(&ikey(v), oid(v), &mut dealloc).unwrap();
    }

    for v in [7, 42, 99] {
        let cur = tree.fetch(Some(&ikey(v)), CompareOp::Equal).unwrap();
        let pos = cur.pos().expect("key should be present");
        assert_eq!(decode_ikey(&pos.key), v);
        assert_eq!(pos.oid, oid(v));
    }

    let miss = tree.fetch(Some(&ikey(5)), CompareOp::Equal).unwrap();
    assert!(miss.is_end());
    assert!(dealloc.is_empty());
}

#[test]
fn test_duplicate_key_rejected_and_tree_unchanged() {
    let (pool, _dir) = create_pool(16);
    let tree = BTreeIndex::create(&pool, int_desc()).unwrap();
    let mut dealloc = Vec::new();

    for v in [1, 2, 3] {
        tree.insert(&ikey(v), oid(v), &mut dealloc).unwrap();
    }

    // Snapshot the root leaf's physical state
    let before = {
        let guard = pool.fetch_page_read(tree.root()).unwrap();
        let view = LeafView::new(guard.as_slice(), tree.root()).unwrap();
        (view.slot_count(), view.free_offset(), view.unused())
    };

    let err = tree.insert(&ikey(2), oid(777), &mut dealloc).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey));

    let after = {
        let guard = pool.fetch_page_read(tree.root()).unwrap();
        let view = LeafView::new(guard.as_slice(), tree.root()).unwrap();
        (view.slot_count(), view.free_offset(), view.unused())
    };
    assert_eq!(before, after);

    // And the original association survives
    let cur = tree.fetch(Some(&ikey(2)), CompareOp::Equal).unwrap();
    assert_eq!(cur.pos().unwrap().oid, oid(2));
}

#[test]
fn test_ascending_inserts_split_leaf() {
    let (pool, _dir) = create_pool(32);
    let tree = BTreeIndex::create(&pool, int_desc()).unwrap();
    let mut dealloc = Vec::new();

    // Insert until just past one leaf's capacity so exactly one split
    // occurs: 16-byte entries + 2-byte slots in a 4076-byte area hold
    // 226 entries.
    let n = 227;
    for v in 1..=n {
        tree.insert(&ikey(v), oid(v), &mut dealloc).unwrap();
    }

    // Root grew in place into an internal page with exactly one entry
    let root_guard = pool.fetch_page_read(tree.root()).unwrap();
    assert_eq!(layout::page_kind(root_guard.as_slice()), PageKind::Internal);
    let root_view = InternalView::new(root_guard.as_slice(), tree.root()).unwrap();
    assert_eq!(root_view.slot_count(), 1);

    // The separator equals the smallest key in the right sibling
    let separator = i32::from_le_bytes(root_view.key_at(0).try_into().unwrap());
    let right_id = tree.root().same_volume(root_view.child_at(0));
    drop(root_guard);
    let right_guard = pool.fetch_page_read(right_id).unwrap();
    let right_view = LeafView::new(right_guard.as_slice(), right_id).unwrap();
    let right_min = i32::from_le_bytes(right_view.key_at(0).try_into().unwrap());
    assert_eq!(separator, right_min);
    drop(right_guard);

    assert_eq!(collect_ascending(&tree), (1..=n).collect::<Vec<_>>());
}

#[test]
fn test_unordered_inserts_scan_sorted() {
    let (pool, _dir) = create_pool(32);
    let tree = BTreeIndex::create(&pool, int_desc()).unwrap();
    let mut dealloc = Vec::new();

    // A fixed permutation of 0..997 (997 is prime, so i*419 mod 997
    // hits every residue once)
    let n = 997;
    for i in 0..n {
        let v = (i * 419) % n;
        tree.insert(&ikey(v), oid(v), &mut dealloc).unwrap();
    }

    assert_eq!(collect_ascending(&tree), (0..n).collect::<Vec<_>>());
}

#[test]
fn test_root_page_id_stable_across_splits() {
    let (pool, _dir) = create_pool(32);
    let tree = BTreeIndex::create(&pool, int_desc()).unwrap();
    let mut dealloc = Vec::new();

    let root = tree.root();
    for v in 0..1000 {
        tree.insert(&ikey(v), oid(v), &mut dealloc).unwrap();
    }
    assert_eq!(tree.root(), root);

    // The stable root still resolves lookups after growth
    let cur = tree.fetch(Some(&ikey(500)), CompareOp::Equal).unwrap();
    assert_eq!(cur.pos().unwrap().oid, oid(500));
}

#[test]
fn test_multilevel_tree_with_long_keys() {
    let (pool, _dir) = create_pool(64);
    // Long varstring keys shrink page fan-out so internal splits and a
    // third level show up at a modest key count.
    let desc = KeyDescriptor::new(vec![KeyPart::varstring(256)]);
    let tree = BTreeIndex::create(&pool, desc).unwrap();
    let mut dealloc = Vec::new();

    let make_key = |i: usize| {
        // Zero-padded decimal sorts lexicographically in numeric order
        let s = format!("{i:0>200}");
        KeyValue::builder().push_varstring(s.as_bytes()).build()
    };

    let n = 1200;
    for i in 0..n {
        // Spread the insert order with a stride coprime to n
        let v = (i * 541) % n;
        tree.insert(&make_key(v), ObjectId::new(v as u32, 0, 0), &mut dealloc)
            .unwrap();
    }

    // Height reached 3: the root is internal and so is its leftmost child
    {
        let root_guard = pool.fetch_page_read(tree.root()).unwrap();
        assert_eq!(layout::page_kind(root_guard.as_slice()), PageKind::Internal);
        let child_no = InternalView::new(root_guard.as_slice(), tree.root())
            .unwrap()
            .leftmost_child();
        drop(root_guard);
        let child_guard = pool
            .fetch_page_read(tree.root().same_volume(child_no))
            .unwrap();
        assert_eq!(layout::page_kind(child_guard.as_slice()), PageKind::Internal);
    }

    // Full ascending walk sees every key once, in order
    let mut seen = 0usize;
    let mut last: Option<KeyValue> = None;
    let mut cur = tree.fetch(None, CompareOp::ToEnd).unwrap();
    while let Some(pos) = cur.pos() {
        if let Some(prev) = &last {
            assert!(prev.as_bytes() < pos.key.as_bytes());
        }
        last = Some(pos.key.clone());
        seen += 1;
        cur = tree.fetch_next(None, CompareOp::ToEnd, &cur).unwrap();
    }
    assert_eq!(seen, n);
}

#[test]
fn test_oversized_entry_spills_to_overflow() {
    let (pool, _dir) = create_pool(16);
    let desc = KeyDescriptor::new(vec![KeyPart::varstring(1600)]);
    let tree = BTreeIndex::create(&pool, desc).unwrap();
    let mut dealloc = Vec::new();

    let big = KeyValue::builder().push_varstring(&vec![b'x'; 1500]).build();
    tree.insert(&big, ObjectId::new(11, 2, 3), &mut dealloc).unwrap();

    // The leaf entry is a marker pointing at an overflow chain
    {
        let guard = pool.fetch_page_read(tree.root()).unwrap();
        let view = LeafView::new(guard.as_slice(), tree.root()).unwrap();
        assert_eq!(view.slot_count(), 1);
        assert_eq!(view.object_count_at(0), OVERFLOW_MARKER);
    }

    // Lookup resolves through the chain
    let cur = tree.fetch(Some(&big), CompareOp::Equal).unwrap();
    assert_eq!(cur.pos().unwrap().oid, ObjectId::new(11, 2, 3));
}

#[test]
fn test_split_keeps_both_halves_within_page_capacity() {
    let (pool, _dir) = create_pool(32);
    let desc = KeyDescriptor::new(vec![KeyPart::varstring(1600)]);
    let tree = BTreeIndex::create(&pool, desc).unwrap();
    let mut dealloc = Vec::new();

    let short = |prefix: char, i: usize| {
        KeyValue::builder()
            .push_varstring(format!("{prefix}{i:0>4}").as_bytes())
            .build()
    };
    let giant = |fill: u8| KeyValue::builder().push_varstring(&vec![fill; 1596]).build();

    // Pack the root leaf completely: 56 short keys, one near-maximum
    // key, 55 short keys after it.
    for i in 0..56 {
        tree.insert(&short('a', i), ObjectId::new(i as u32, 0, 0), &mut dealloc)
            .unwrap();
    }
    tree.insert(&giant(b'm'), ObjectId::new(1000, 0, 0), &mut dealloc)
        .unwrap();
    for i in 0..55 {
        tree.insert(&short('z', i), ObjectId::new(100 + i as u32, 0, 0), &mut dealloc)
            .unwrap();
    }

    // A second near-maximum key next to the first puts both giants at
    // the byte midpoint of the split.
    tree.insert(&giant(b'n'), ObjectId::new(2000, 0, 0), &mut dealloc)
        .unwrap();

    // Neither resulting leaf holds more bytes than its usable area
    let root_guard = pool.fetch_page_read(tree.root()).unwrap();
    assert_eq!(layout::page_kind(root_guard.as_slice()), PageKind::Internal);
    let root_view = InternalView::new(root_guard.as_slice(), tree.root()).unwrap();
    let mut children = vec![root_view.leftmost_child()];
    for i in 0..root_view.slot_count() {
        children.push(root_view.child_at(i));
    }
    drop(root_guard);

    let mut entries = 0;
    for child_no in children {
        let id = tree.root().same_volume(child_no);
        let guard = pool.fetch_page_read(id).unwrap();
        let view = LeafView::new(guard.as_slice(), id).unwrap();
        assert!(view.total_free() <= LEAF_USABLE);
        assert!(view.contiguous_free() <= LEAF_USABLE);
        entries += view.slot_count();
    }
    assert_eq!(entries, 113);

    // And every key is still reachable, in order
    let mut seen = 0usize;
    let mut last: Option<KeyValue> = None;
    let mut cur = tree.fetch(None, CompareOp::ToEnd).unwrap();
    while let Some(pos) = cur.pos() {
        if let Some(prev) = &last {
            assert!(prev.as_bytes() < pos.key.as_bytes());
        }
        last = Some(pos.key.clone());
        seen += 1;
        cur = tree.fetch_next(None, CompareOp::ToEnd, &cur).unwrap();
    }
    assert_eq!(seen, 113);
}

#[test]
fn test_failed_split_reports_stranded_overflow_page() {
    let (pool, _dir) = create_pool(16);
    let desc = KeyDescriptor::new(vec![KeyPart::varstring(1600)]);
    let tree = BTreeIndex::create(&pool, desc).unwrap();
    let mut dealloc = Vec::new();

    for i in 0..120 {
        let key = KeyValue::builder()
            .push_varstring(format!("a{i:0>4}").as_bytes())
            .build();
        tree.insert(&key, ObjectId::new(i as u32, 0, 0), &mut dealloc)
            .unwrap();
    }

    // Point the leaf's forward link at a page that does not exist, so
    // the split fails while restitching the sibling chain.
    {
        let mut guard = pool.fetch_page_write(tree.root()).unwrap();
        let id = guard.page_id();
        LeafViewMut::new(guard.as_mut_slice(), id)
            .unwrap()
            .set_next_page(7777);
    }

    let giant = KeyValue::builder().push_varstring(&vec![b'z'; 1596]).build();
    let err = tree
        .insert(&giant, ObjectId::new(9, 9, 9), &mut dealloc)
        .unwrap_err();
    assert!(matches!(err, Error::PageNotFound(_)));

    // The chain head allocated for the spilled entry is handed back for
    // reclamation rather than leaked.
    assert_eq!(dealloc.len(), 1);
}

#[test]
fn test_validation_boundary() {
    let (pool, _dir) = create_pool(8);
    let mut dealloc = Vec::new();

    // Unsupported key-part type is rejected before any page access
    let float_desc = KeyDescriptor::new(vec![KeyPart {
        key_type: arbordb::btree::KeyType::Float,
        length: 4,
    }]);
    assert!(matches!(
        BTreeIndex::create(&pool, float_desc),
        Err(Error::UnsupportedKeyType)
    ));

    let tree = BTreeIndex::create(&pool, int_desc()).unwrap();

    // Empty key
    let empty = KeyValue::from_bytes(vec![]);
    assert!(matches!(
        tree.insert(&empty, oid(1), &mut dealloc),
        Err(Error::BadParameter(_))
    ));

    // Key that does not decode against the descriptor
    let short = KeyValue::from_bytes(vec![1, 2]);
    assert!(matches!(
        tree.insert(&short, oid(1), &mut dealloc),
        Err(Error::BadParameter(_))
    ));
}

#[test]
fn test_persistence_across_sessions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.db");
    let root;

    {
        let dm = DiskManager::create(&path, VolumeId(0)).unwrap();
        let pool = BufferPool::new(16, dm);
        let tree = BTreeIndex::create(&pool, int_desc()).unwrap();
        root = tree.root();
        let mut dealloc = Vec::new();
        for v in 0..500 {
            tree.insert(&ikey(v), oid(v), &mut dealloc).unwrap();
        }
        pool.flush_all_pages().unwrap();
    }

    let dm = DiskManager::open(&path, VolumeId(0)).unwrap();
    let pool = BufferPool::new(16, dm);
    let tree = BTreeIndex::open(&pool, root, int_desc()).unwrap();
    assert_eq!(collect_ascending(&tree), (0..500).collect::<Vec<_>>());
}
