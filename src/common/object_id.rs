//! Object identifier type.

use std::fmt;

/// Identifies an object stored by the external object manager.
///
/// The B-tree associates keys with ObjectIds but never interprets them;
/// they are an opaque 8-byte payload from the index's point of view.
///
/// # Encoding (8 bytes, little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     page_no
/// 4       2     slot_no
/// 6       2     unique
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    /// Data page holding the object.
    pub page_no: u32,
    /// Slot within that page.
    pub slot_no: u16,
    /// Disambiguates reused slots.
    pub unique: u16,
}

impl ObjectId {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    /// Create a new ObjectId.
    #[inline]
    pub fn new(page_no: u32, slot_no: u16, unique: u16) -> Self {
        Self {
            page_no,
            slot_no,
            unique,
        }
    }

    /// Encode into an 8-byte little-endian representation.
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.page_no.to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot_no.to_le_bytes());
        buf[6..8].copy_from_slice(&self.unique.to_le_bytes());
        buf
    }

    /// Decode from the first 8 bytes of a slice.
    ///
    /// # Panics
    /// Panics if `data.len() < ObjectId::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for ObjectId");
        Self {
            page_no: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            slot_no: u16::from_le_bytes([data[4], data[5]]),
            unique: u16::from_le_bytes([data[6], data[7]]),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({}:{}:{})", self.page_no, self.slot_no, self.unique)
    }
}
