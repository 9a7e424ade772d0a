//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations for one
//! volume: reading and writing pages, and allocating new pages.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result, VolumeId};
use crate::storage::page::Page;

/// Manages disk I/O for a single volume (one database file).
///
/// # File Layout
/// Pages are laid out sequentially; page N lives at file offset
/// `N × PAGE_SIZE`.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferPool` is responsible
/// for serializing access to it.
///
/// # Durability
/// All writes are followed by `fsync()`.
pub struct DiskManager {
    file: File,
    /// Volume this file backs; stamped into every allocated PageId.
    volume: VolumeId,
    /// Number of pages in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new volume file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, volume: VolumeId) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            volume,
            page_count: 0,
        })
    }

    /// Open an existing volume file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, volume: VolumeId) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Calculate page count from file size
        let metadata = file.metadata()?;
        let page_count = (metadata.len() / PAGE_SIZE as u64) as u32;

        Ok(Self {
            file,
            volume,
            page_count,
        })
    }

    /// The volume this disk manager backs.
    #[inline]
    pub fn volume(&self) -> VolumeId {
        self.volume
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist on this
    /// volume.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        self.check_page_id(page_id)?;

        let offset = (page_id.page_no as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// The page must have been previously allocated with
    /// `allocate_page()`; the write is fsync'd before returning.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_page_id(page_id)?;

        let offset = (page_id.page_no as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        Ok(())
    }

    /// Allocate a new page on disk.
    ///
    /// Returns the `PageId` of the newly allocated page. The page is
    /// initialized with zeros and the allocation is fsync'd.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = PageId::new(self.volume, self.page_count);

        // Extend file with a zeroed page
        let offset = (page_id.page_no as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;

        let zeros = [0u8; PAGE_SIZE];
        self.file.write_all(&zeros)?;
        self.file.sync_all()?;

        self.page_count += 1;
        Ok(page_id)
    }

    /// Get the number of pages in the volume.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    fn check_page_id(&self, page_id: PageId) -> Result<()> {
        if page_id.volume != self.volume || page_id.page_no >= self.page_count {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }
}
