//! Error types for arbordb.

use crate::common::PageId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write
/// `Result<T>`. This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in arbordb.
///
/// A single error type keeps error handling consistent across the
/// storage, buffer, and index layers. Storage-layer failures surface
/// through B-tree operations unchanged; the index layer never retries
/// or recovers from them locally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(PageId),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("no free frames available in buffer pool")]
    NoFreeFrames,

    /// A page read from disk failed checksum verification.
    #[error("page {0} failed checksum verification")]
    CorruptPage(PageId),

    /// A required argument is structurally invalid: an empty key
    /// descriptor, an over-length key, or a key that does not decode
    /// against its descriptor.
    #[error("bad parameter: {0}")]
    BadParameter(&'static str),

    /// A cursor's saved position is no longer interpretable (the page
    /// it references is not a leaf).
    #[error("cursor position is no longer valid")]
    BadCursor,

    /// A key descriptor part is neither an integer nor a variable-length
    /// string. This is a capability boundary of the engine, checked at
    /// every public entry point before any page is touched.
    #[error("unsupported key part type")]
    UnsupportedKeyType,

    /// Leaf insert found an existing entry for the key. The engine does
    /// not merge duplicate-key object lists on insert.
    #[error("duplicate key")]
    DuplicateKey,

    /// A page's header kind does not match the expected leaf or internal
    /// role.
    #[error("page {page} has kind {found}, expected {expected}")]
    BadPageType {
        page: PageId,
        expected: &'static str,
        found: u8,
    },

    /// The cursor navigator was given a comparison operator outside the
    /// recognized set.
    #[error("comparison operator not supported by scans")]
    BadCompareOp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::VolumeId;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(VolumeId(0), 42));
        assert_eq!(format!("{}", err), "page Page(0:42) not found");

        let err = Error::DuplicateKey;
        assert_eq!(format!("{}", err), "duplicate key");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error as _;

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: Error = io_err.into();
        assert!(err.source().is_some());
        assert!(Error::DuplicateKey.source().is_none());
    }
}
