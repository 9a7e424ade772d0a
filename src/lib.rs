//! ArborDB - a disk-resident B+-tree index over a pin-counted page cache.
//!
//! # Architecture
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                           ArborDB                             │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────────────────────────────────┐   │
//! │  │                B-tree Layer (btree/)                   │   │
//! │  │   BTreeIndex: insert + cursor scans                    │   │
//! │  │   key codec │ page layout │ search │ split │ cursor    │   │
//! │  └───────────────────────────────────────────────────────┘   │
//! │                             ↓                                 │
//! │  ┌───────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                     │   │
//! │  │   BufferPool + Frame + RAII page guards + FIFO         │   │
//! │  │   replacer + Statistics                                │   │
//! │  └───────────────────────────────────────────────────────┘   │
//! │                             ↓                                 │
//! │  ┌───────────────────────────────────────────────────────┐   │
//! │  │             Storage Layer (storage/)                   │   │
//! │  │   DiskManager + checksummed 4KB Page                   │   │
//! │  └───────────────────────────────────────────────────────┘   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, ObjectId, Error, config)
//! - [`storage`] - Disk I/O and the raw page container
//! - [`buffer`] - Page cache with pin-counted RAII guards
//! - [`btree`] - The B+-tree index itself
//!
//! # Quick Start
//! ```no_run
//! use arbordb::btree::{BTreeIndex, CompareOp, KeyDescriptor, KeyPart, KeyValue};
//! use arbordb::buffer::BufferPool;
//! use arbordb::common::{ObjectId, VolumeId};
//! use arbordb::storage::DiskManager;
//!
//! # fn main() -> arbordb::Result<()> {
//! let dm = DiskManager::create("index.db", VolumeId(0))?;
//! let pool = BufferPool::new(64, dm);
//!
//! let desc = KeyDescriptor::new(vec![KeyPart::integer(4)]);
//! let tree = BTreeIndex::create(&pool, desc)?;
//!
//! let key = KeyValue::builder().push_i32(42).build();
//! let mut dealloc = Vec::new();
//! tree.insert(&key, ObjectId::new(7, 0, 0), &mut dealloc)?;
//!
//! let cursor = tree.fetch(Some(&key), CompareOp::Equal)?;
//! assert!(!cursor.is_end());
//! # Ok(())
//! # }
//! ```

pub mod btree;
pub mod buffer;
pub mod common;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use btree::{BTreeIndex, BtreeCursor, CompareOp, KeyDescriptor, KeyPart, KeyValue};
pub use buffer::BufferPool;
pub use common::config::PAGE_SIZE;
pub use common::{Error, ObjectId, PageId, Result, VolumeId};
pub use storage::DiskManager;
