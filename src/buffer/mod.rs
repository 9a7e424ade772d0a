//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache layer between the B-tree and
//! disk. It manages a fixed pool of frames, each holding one page. This
//! is the "page store" collaborator of the index: acquire pins a page,
//! dropping the guard releases it, write guards mark it dirty.
//!
//! # Components
//! - [`BufferPool`] - The main page cache
//! - [`Frame`] - A slot in the buffer pool holding a page + metadata
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII guards for page access
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy implementations

mod frame;
mod page_guard;
mod pool;
pub mod replacer;
mod stats;

pub use frame::Frame;
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use pool::BufferPool;
pub use stats::{BufferPoolStats, StatsSnapshot};
