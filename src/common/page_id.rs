//! Page identifier types.

use std::fmt;

/// Identifies a database volume (one file on disk).
///
/// Sibling and child pointers stored *inside* pages record only the
/// 32-bit page number; the volume is implied by the page they live in,
/// so a full [`PageId`] is reconstructed with the parent's volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(pub u16);

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Volume({})", self.0)
    }
}

/// Sentinel page number meaning "no page" (nil sibling/overflow link).
pub const NO_PAGE: u32 = u32::MAX;

/// Identifies a page on disk: a volume plus a page number within it.
///
/// Page N of a volume lives at file offset `N × PAGE_SIZE`. PageIds are
/// equality-comparable handles; no arithmetic happens outside the disk
/// manager.
///
/// # Example
/// ```
/// use arbordb::common::{PageId, VolumeId};
///
/// let pid = PageId::new(VolumeId(0), 42);
/// assert_eq!(pid.page_no, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub volume: VolumeId,
    pub page_no: u32,
}

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(volume: VolumeId, page_no: u32) -> Self {
        PageId { volume, page_no }
    }

    /// Build the PageId of a sibling/child page number stored inside a
    /// page of the same volume.
    #[inline]
    pub fn same_volume(&self, page_no: u32) -> Self {
        PageId {
            volume: self.volume,
            page_no,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.volume.0, self.page_no)
    }
}
