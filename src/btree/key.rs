//! Key descriptors, encoded key values, and comparison.
//!
//! A key is a (possibly composite) sequence of parts described by a
//! [`KeyDescriptor`]. Encoded keys are flat byte strings: an integer
//! part contributes its fixed width in little-endian two's-complement,
//! a variable-length string part contributes a u16 length prefix
//! followed by its bytes. Comparison walks the parts in descriptor
//! order.
//!
//! Only integer and variable-length string parts are supported; this is
//! a capability boundary of the engine, checked at every public entry
//! point before any page is touched.

use std::cmp::Ordering;

use crate::common::config::{MAX_KEY_LEN, MAX_KEY_PARTS};
use crate::common::{Error, Result};

/// Declared type of one key part.
///
/// The catalog's type system is wider than what this engine indexes;
/// descriptors carrying anything but [`KeyType::Integer`] or
/// [`KeyType::VarString`] are rejected with
/// [`Error::UnsupportedKeyType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Fixed-width signed integer (2, 4, or 8 bytes).
    Integer,
    /// 32-bit float. Not indexable by this engine.
    Float,
    /// 64-bit float. Not indexable by this engine.
    Double,
    /// Fixed-length string. Not indexable by this engine.
    FixedString,
    /// Variable-length byte string with a u16 length prefix.
    VarString,
}

impl KeyType {
    /// Whether this engine can index keys with a part of this type.
    #[inline]
    pub fn is_supported(self) -> bool {
        matches!(self, KeyType::Integer | KeyType::VarString)
    }
}

/// One part of a composite key descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPart {
    pub key_type: KeyType,
    /// Width in bytes for integer parts; maximum length for varstring
    /// parts (informational — the encoded length prefix governs).
    pub length: u16,
}

impl KeyPart {
    /// An integer part of the given byte width.
    pub fn integer(width: u16) -> Self {
        Self {
            key_type: KeyType::Integer,
            length: width,
        }
    }

    /// A variable-length string part with the given maximum length.
    pub fn varstring(max_len: u16) -> Self {
        Self {
            key_type: KeyType::VarString,
            length: max_len,
        }
    }
}

/// Ordered sequence of key-part descriptors defining a key's shape and
/// total order.
#[derive(Debug, Clone)]
pub struct KeyDescriptor {
    pub parts: Vec<KeyPart>,
}

impl KeyDescriptor {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self { parts }
    }

    /// Check that this descriptor is usable by the engine.
    ///
    /// Re-validated at every public entry point: insertion and
    /// navigation are separate doors into the engine.
    pub fn validate(&self) -> Result<()> {
        if self.parts.is_empty() {
            return Err(Error::BadParameter("key descriptor has no parts"));
        }
        if self.parts.len() > MAX_KEY_PARTS {
            return Err(Error::BadParameter("key descriptor has too many parts"));
        }
        for part in &self.parts {
            if !part.key_type.is_supported() {
                return Err(Error::UnsupportedKeyType);
            }
            if part.key_type == KeyType::Integer && !matches!(part.length, 2 | 4 | 8) {
                return Err(Error::BadParameter("integer key part has invalid width"));
            }
        }
        Ok(())
    }
}

/// A single encoded (possibly composite) key instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    bytes: Vec<u8>,
}

impl KeyValue {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Start building a composite key.
    pub fn builder() -> KeyBuilder {
        KeyBuilder { bytes: Vec::new() }
    }
}

/// Builder assembling an encoded key part by part.
///
/// ```
/// use arbordb::btree::KeyValue;
///
/// let key = KeyValue::builder().push_i32(7).push_varstring(b"abc").build();
/// assert_eq!(key.len(), 4 + 2 + 3);
/// ```
pub struct KeyBuilder {
    bytes: Vec<u8>,
}

impl KeyBuilder {
    /// Append a 2-byte integer part.
    pub fn push_i16(mut self, v: i16) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Append a 4-byte integer part.
    pub fn push_i32(mut self, v: i32) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Append an 8-byte integer part.
    pub fn push_i64(mut self, v: i64) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Append a variable-length string part (u16 length prefix).
    ///
    /// # Panics
    /// Panics if `s` is longer than `u16::MAX` bytes.
    pub fn push_varstring(mut self, s: &[u8]) -> Self {
        let len = u16::try_from(s.len()).expect("varstring part too long");
        self.bytes.extend_from_slice(&len.to_le_bytes());
        self.bytes.extend_from_slice(s);
        self
    }

    pub fn build(self) -> KeyValue {
        KeyValue::from_bytes(self.bytes)
    }
}

/// Check that an encoded key decodes exactly against its descriptor and
/// respects the engine's length limits.
pub fn validate_key(desc: &KeyDescriptor, key: &KeyValue) -> Result<()> {
    if key.is_empty() {
        return Err(Error::BadParameter("empty key"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(Error::BadParameter("key exceeds maximum length"));
    }

    let bytes = key.as_bytes();
    let mut pos = 0usize;
    for part in &desc.parts {
        match part.key_type {
            KeyType::Integer => {
                pos += part.length as usize;
            }
            KeyType::VarString => {
                if pos + 2 > bytes.len() {
                    return Err(Error::BadParameter("key does not decode against descriptor"));
                }
                let len = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
                pos += 2 + len;
            }
            _ => return Err(Error::UnsupportedKeyType),
        }
        if pos > bytes.len() {
            return Err(Error::BadParameter("key does not decode against descriptor"));
        }
    }
    if pos != bytes.len() {
        return Err(Error::BadParameter("key has trailing bytes"));
    }
    Ok(())
}

/// Compare two encoded keys part-by-part in descriptor order.
///
/// Integer parts compare numerically; varstring parts compare
/// byte-lexicographically up to the shorter length, then by length.
/// Both keys must decode fully against the descriptor.
pub fn key_compare(desc: &KeyDescriptor, a: &[u8], b: &[u8]) -> Result<Ordering> {
    let mut pa = 0usize;
    let mut pb = 0usize;

    for part in &desc.parts {
        match part.key_type {
            KeyType::Integer => {
                let w = part.length as usize;
                let va = read_int(a, pa, w)?;
                let vb = read_int(b, pb, w)?;
                pa += w;
                pb += w;
                match va.cmp(&vb) {
                    Ordering::Equal => {}
                    ord => return Ok(ord),
                }
            }
            KeyType::VarString => {
                let (sa, na) = read_varstring(a, pa)?;
                let (sb, nb) = read_varstring(b, pb)?;
                pa = na;
                pb = nb;
                let common = sa.len().min(sb.len());
                match sa[..common].cmp(&sb[..common]) {
                    Ordering::Equal => match sa.len().cmp(&sb.len()) {
                        Ordering::Equal => {}
                        ord => return Ok(ord),
                    },
                    ord => return Ok(ord),
                }
            }
            _ => return Err(Error::UnsupportedKeyType),
        }
    }

    Ok(Ordering::Equal)
}

fn read_int(bytes: &[u8], pos: usize, width: usize) -> Result<i64> {
    let end = pos + width;
    if end > bytes.len() {
        return Err(Error::BadParameter("key does not decode against descriptor"));
    }
    let v = match width {
        2 => i16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as i64,
        4 => i32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
            as i64,
        8 => i64::from_le_bytes([
            bytes[pos],
            bytes[pos + 1],
            bytes[pos + 2],
            bytes[pos + 3],
            bytes[pos + 4],
            bytes[pos + 5],
            bytes[pos + 6],
            bytes[pos + 7],
        ]),
        _ => return Err(Error::BadParameter("integer key part has invalid width")),
    };
    Ok(v)
}

fn read_varstring(bytes: &[u8], pos: usize) -> Result<(&[u8], usize)> {
    if pos + 2 > bytes.len() {
        return Err(Error::BadParameter("key does not decode against descriptor"));
    }
    let len = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
    let start = pos + 2;
    let end = start + len;
    if end > bytes.len() {
        return Err(Error::BadParameter("key does not decode against descriptor"));
    }
    Ok((&bytes[start..end], end))
}
