//! Archive type definitions
//!
//! Contains the entry model produced by signature scanning. Every field read
//! from a local file header is untrusted: sizes and checksums may be zeroed or
//! wrong in a damaged archive.

use std::ops::Range;

use serde::Serialize;

/// General purpose flag bit 3: sizes and CRC live in a trailing data descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// Per-entry compression method as declared in the local header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompressionMethod {
    /// Method 0
    Store,
    /// Method 8
    Deflate,
    /// Any other method code
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => CompressionMethod::Store,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Unknown(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            CompressionMethod::Store => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionMethod::Store => write!(f, "store"),
            CompressionMethod::Deflate => write!(f, "deflate"),
            CompressionMethod::Unknown(code) => write!(f, "method {}", code),
        }
    }
}

/// One entry discovered from a local file header signature
///
/// `compressed_range` always lies within the scanned buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Archive-relative path, never empty and never ending in `/`
    pub path: String,
    pub compression_method: CompressionMethod,
    /// Byte range of the entry data within the raw buffer
    pub compressed_range: Range<usize>,
    /// Uncompressed size from the header (untrusted)
    pub declared_uncompressed_size: Option<u64>,
    /// CRC-32 from the header, absent when a data descriptor carries it
    pub declared_crc32: Option<u32>,
    /// Offset of the `PK\x03\x04` signature
    pub header_offset: usize,
    pub flags: u16,
    /// Range was cut at the next signature because the declared size was zero or overran
    pub size_clamped: bool,
}

impl ArchiveEntry {
    /// Borrow the entry's data bytes from the buffer it was scanned from
    pub fn data<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        let end = self.compressed_range.end.min(raw.len());
        let start = self.compressed_range.start.min(end);
        &raw[start..end]
    }

    pub fn compressed_len(&self) -> usize {
        self.compressed_range.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_codes() {
        assert_eq!(CompressionMethod::from_code(0), CompressionMethod::Store);
        assert_eq!(CompressionMethod::from_code(8), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::from_code(12), CompressionMethod::Unknown(12));
        assert_eq!(CompressionMethod::Unknown(12).code(), 12);
        assert_eq!(CompressionMethod::Deflate.to_string(), "deflate");
    }

    #[test]
    fn test_data_is_clamped_to_buffer() {
        let entry = ArchiveEntry {
            path: "a.xml".to_string(),
            compression_method: CompressionMethod::Store,
            compressed_range: 2..10,
            declared_uncompressed_size: None,
            declared_crc32: None,
            header_offset: 0,
            flags: 0,
            size_clamped: false,
        };

        assert_eq!(entry.data(b"abcdef"), b"cdef");
        assert_eq!(entry.compressed_len(), 8);
    }
}
