//! Buffer pool - the page caching layer.
//!
//! The [`BufferPool`] is the "page store" the B-tree operates against:
//! - Page caching between disk and memory
//! - Pin-based reference counting (acquire = pin, guard drop = release)
//! - Automatic dirty page write-back with checksum stamping
//! - FIFO eviction of unpinned pages

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::FifoReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result, VolumeId};
use crate::storage::DiskManager;

/// Manages a pool of buffer frames caching disk pages.
///
/// # Thread Safety
/// - `page_table`: `RwLock` — many readers, few writers
/// - `free_list`: `Mutex` — always modified
/// - `replacer`: `Mutex` — internal state changes on access
/// - `disk_manager`: `Mutex` — single-threaded I/O
/// - `frames`: No lock — fixed size, each Frame has internal locks
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::create("test.db", VolumeId(0))?;
/// let pool = BufferPool::new(10, dm);
///
/// let mut guard = pool.new_page()?;   // allocate + pin
/// guard.as_mut_slice()[0] = 0xAB;
/// // guard drops: page marked dirty, unpinned
/// ```
pub struct BufferPool {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps page IDs to frame IDs.
    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,

    /// Eviction policy for selecting victim frames.
    replacer: Mutex<FifoReplacer>,

    /// Handles all disk I/O for the backing volume.
    disk_manager: Mutex<DiskManager>,

    /// Performance statistics.
    stats: BufferPoolStats,

    /// Volume backed by this pool's disk manager.
    volume: VolumeId,
}

impl BufferPool {
    /// Create a new buffer pool.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).map(FrameId::new).collect();
        let volume = disk_manager.volume();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(FifoReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            volume,
        }
    }

    /// The volume this pool serves.
    #[inline]
    pub fn volume(&self) -> VolumeId {
        self.volume
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared access, pins the page).
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - `Error::CorruptPage` if the on-disk checksum doesn't verify
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for writing (exclusive access, pins the page).
    ///
    /// The page is marked dirty when the guard drops.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Allocate a new page on disk and load it into the buffer pool.
    ///
    /// Returns a write guard for the new (zeroed) page.
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        // Get a free frame (or evict one)
        let frame_id = self.get_free_frame()?;

        // Allocate page on disk
        let page_id = {
            let mut dm = self.disk_manager.lock();
            dm.allocate_page()?
        };

        let frame = &self.frames[frame_id.0];

        frame.page_mut().reset();
        frame.set_page_id(Some(page_id));
        frame.pin();

        {
            let mut pt = self.page_table.write();
            pt.insert(page_id, frame_id);
        }

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        let lock = frame.page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Flush a specific page to disk if it's dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = {
            let pt = self.page_table.read();
            match pt.get(&page_id) {
                Some(&fid) => fid,
                None => return Ok(()), // Page not in pool
            }
        };

        self.flush_frame(frame_id, page_id)
    }

    /// Flush all dirty pages to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }

        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    // ========================================================================
    // Internal: Called by PageGuard on drop
    // ========================================================================

    /// Unpin a page. Called by PageReadGuard/PageWriteGuard on drop.
    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        let new_pin_count = frame.unpin();

        // If pin count dropped to 0, page is now evictable
        if new_pin_count == 0 {
            let mut replacer = self.replacer.lock();
            replacer.set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    /// Fetch a page into the buffer pool, returning its frame ID.
    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        // Fast path: check if page is already in pool (read lock only)
        {
            let pt = self.page_table.read();
            if let Some(&frame_id) = pt.get(&page_id) {
                self.handle_cache_hit(frame_id);
                return Ok(frame_id);
            }
        }

        // Cache miss: need to load from disk
        self.handle_cache_miss(page_id)
    }

    /// Handle a cache hit: pin the frame and update replacer.
    fn handle_cache_hit(&self, frame_id: FrameId) {
        let frame = &self.frames[frame_id.0];
        frame.pin();

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Handle a cache miss: get a frame, load from disk, verify, map.
    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let frame_id = self.get_free_frame()?;

        let page_data = {
            let mut dm = self.disk_manager.lock();
            dm.read_page(page_id)?
        };

        // A zero stored checksum means the page was never flushed
        // (freshly allocated); anything else must verify.
        if page_data.stored_checksum() != 0 && !page_data.verify_checksum() {
            // Frame was never mapped; hand it back before failing.
            self.free_list.lock().push(frame_id);
            return Err(Error::CorruptPage(page_id));
        }

        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];

        {
            let mut page = frame.page_mut();
            page.as_mut_slice().copy_from_slice(page_data.as_slice());
        }

        frame.set_page_id(Some(page_id));
        frame.pin();

        {
            let mut pt = self.page_table.write();
            pt.insert(page_id, frame_id);
        }

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        Ok(frame_id)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Get a free frame, evicting if necessary.
    fn get_free_frame(&self) -> Result<FrameId> {
        {
            let mut fl = self.free_list.lock();
            if let Some(frame_id) = fl.pop() {
                return Ok(frame_id);
            }
        }

        // No free frames, need to evict
        self.evict_page()
    }

    /// Evict a page and return its frame.
    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = {
            let mut replacer = self.replacer.lock();
            replacer.evict().ok_or(Error::NoFreeFrames)?
        };

        self.stats.evictions.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        let old_page_id = frame.page_id();

        // If dirty, flush to disk
        if frame.is_dirty() {
            if let Some(pid) = old_page_id {
                self.flush_frame(frame_id, pid)?;
            }
        }

        if let Some(pid) = old_page_id {
            let mut pt = self.page_table.write();
            pt.remove(&pid);
        }

        frame.clear_dirty();
        frame.set_page_id(None);

        Ok(frame_id)
    }

    /// Flush a frame to disk if dirty, stamping the checksum first.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.is_dirty() {
            let mut page = frame.page_mut();
            page.update_checksum();
            {
                let mut dm = self.disk_manager.lock();
                dm.write_page(page_id, &page)?;
            }
            drop(page);

            frame.clear_dirty();
            self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Helper to create a pool with a temporary volume file.
    fn create_test_pool(pool_size: usize) -> (BufferPool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let dm = DiskManager::create(&path, VolumeId(0)).unwrap();
        (BufferPool::new(pool_size, dm), dir)
    }

    fn pid(pool: &BufferPool, page_no: u32) -> PageId {
        PageId::new(pool.volume(), page_no)
    }

    #[test]
    fn test_new_page() {
        let (pool, _dir) = create_test_pool(10);

        let guard = pool.new_page().unwrap();
        assert_eq!(guard.page_id().page_no, 0);
        drop(guard);

        let guard = pool.new_page().unwrap();
        assert_eq!(guard.page_id().page_no, 1);
    }

    #[test]
    fn test_fetch_roundtrip() {
        let (pool, _dir) = create_test_pool(10);

        {
            let mut guard = pool.new_page().unwrap();
            guard.as_mut_slice()[0] = 0xAB;
        }

        {
            let guard = pool.fetch_page_read(pid(&pool, 0)).unwrap();
            assert_eq!(guard.as_slice()[0], 0xAB);
        }
    }

    #[test]
    fn test_cache_hit() {
        let (pool, _dir) = create_test_pool(10);

        {
            let _guard = pool.new_page().unwrap();
        }
        {
            let _guard = pool.fetch_page_read(pid(&pool, 0)).unwrap();
        }
        {
            let _guard = pool.fetch_page_read(pid(&pool, 0)).unwrap();
        }

        let snapshot = pool.stats().snapshot();
        assert!(snapshot.cache_hits >= 2);
    }

    #[test]
    fn test_eviction_flushes_dirty_page() {
        let (pool, _dir) = create_test_pool(1); // Only 1 frame!

        {
            let mut guard = pool.new_page().unwrap();
            guard.as_mut_slice()[0] = 0x42;
        } // Drops, marks dirty

        // Create page 1 (evicts page 0, should flush with checksum)
        {
            let _guard = pool.new_page().unwrap();
        }

        // Fetch page 0 again (reloads from disk, verifies checksum)
        {
            let guard = pool.fetch_page_read(pid(&pool, 0)).unwrap();
            assert_eq!(guard.as_slice()[0], 0x42);
            assert!(guard.verify_checksum());
        }
    }

    #[test]
    fn test_no_free_frames() {
        let (pool, _dir) = create_test_pool(2);

        let _guard1 = pool.new_page().unwrap();
        let _guard2 = pool.new_page().unwrap();

        // All frames pinned, can't allocate
        assert!(matches!(pool.new_page(), Err(Error::NoFreeFrames)));
    }

    #[test]
    fn test_multiple_read_guards() {
        let (pool, _dir) = create_test_pool(10);

        {
            let _guard = pool.new_page().unwrap();
        }

        let guard1 = pool.fetch_page_read(pid(&pool, 0)).unwrap();
        let guard2 = pool.fetch_page_read(pid(&pool, 0)).unwrap();
        assert_eq!(guard1.page_id(), guard2.page_id());
    }

    #[test]
    fn test_page_not_found() {
        let (pool, _dir) = create_test_pool(10);
        assert!(pool.fetch_page_read(pid(&pool, 999)).is_err());
    }

    #[test]
    fn test_flush_all_pages() {
        let (pool, _dir) = create_test_pool(10);

        for i in 0..5u8 {
            let mut guard = pool.new_page().unwrap();
            guard.as_mut_slice()[0] = i;
        }

        pool.flush_all_pages().unwrap();

        let snapshot = pool.stats().snapshot();
        assert!(snapshot.pages_written >= 5);
    }

    #[test]
    fn test_concurrent_reads() {
        use std::sync::Arc;
        use std::thread;

        let (pool, _dir) = create_test_pool(10);
        let pool = Arc::new(pool);

        {
            let mut guard = pool.new_page().unwrap();
            guard.as_mut_slice()[0] = 0x42;
        }

        let mut handles = vec![];
        for _ in 0..10 {
            let pool_clone = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                let target = PageId::new(pool_clone.volume(), 0);
                let guard = pool_clone.fetch_page_read(target).unwrap();
                assert_eq!(guard.as_slice()[0], 0x42);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
