//! ZIP end-of-central-directory probing
//!
//! Used for diagnostics only: the structured reader decides whether the
//! central directory is usable, this module explains what was found.
//!
//! ## EOCD Layout
//! | Offset | Size | Field              |
//! |--------|------|--------------------|
//! | 0x00   | 4    | Signature (PK\x05\x06) |
//! | 0x0A   | 2    | Total Entries      |
//! | 0x0C   | 4    | Central Dir Size   |
//! | 0x10   | 4    | Central Dir Offset |

use serde::Serialize;

use super::detection::{rfind_signature, ZIP_CENTRAL_DIR_SIG, ZIP_EOCD_SIG};
use crate::common::binary::{read_bytes_at, read_u16_at, read_u32_at};

/// Fixed part of the EOCD record
const EOCD_MIN_LEN: usize = 22;
/// EOCD plus the longest possible archive comment
const EOCD_SEARCH_WINDOW: usize = EOCD_MIN_LEN + u16::MAX as usize;

/// What the end-of-central-directory record claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CentralDirectoryInfo {
    pub eocd_offset: usize,
    pub entry_count: u16,
    pub central_dir_size: u32,
    pub central_dir_offset: u32,
    /// A `PK\x01\x02` record sits where the EOCD says the directory starts
    pub central_dir_signature_valid: bool,
}

/// Parse the last EOCD record in the buffer, if any
pub fn locate_central_directory(buf: &[u8]) -> Option<CentralDirectoryInfo> {
    let search_start = buf.len().saturating_sub(EOCD_SEARCH_WINDOW);
    let eocd_rel = rfind_signature(&buf[search_start..], ZIP_EOCD_SIG)?;
    let eocd_offset = search_start + eocd_rel;

    // Offset 0x0A: Total entries (2 bytes)
    let entry_count = read_u16_at(buf, eocd_offset + 10)?;
    // Offset 0x0C: Central Directory Size (4 bytes)
    let central_dir_size = read_u32_at(buf, eocd_offset + 12)?;
    // Offset 0x10: Central Directory Offset (4 bytes)
    let central_dir_offset = read_u32_at(buf, eocd_offset + 16)?;

    let central_dir_signature_valid = read_bytes_at(buf, central_dir_offset as usize, 4)
        .map(|sig| sig == ZIP_CENTRAL_DIR_SIG)
        .unwrap_or(false);

    Some(CentralDirectoryInfo {
        eocd_offset,
        entry_count,
        central_dir_size,
        central_dir_offset,
        central_dir_signature_valid,
    })
}

/// One-line description of the central directory state for report notes
pub fn describe_central_directory(buf: &[u8]) -> String {
    match locate_central_directory(buf) {
        None => "no end-of-central-directory record found".to_string(),
        Some(info) if info.central_dir_signature_valid => format!(
            "end-of-central-directory record at offset {} lists {} entries",
            info.eocd_offset, info.entry_count
        ),
        Some(info) => format!(
            "end-of-central-directory record at offset {} points to a damaged central directory at offset {}",
            info.eocd_offset, info.central_dir_offset
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::build_zip;

    #[test]
    fn test_locate_in_healthy_archive() {
        let zip = build_zip(&[("a.txt", b"hello".as_slice()), ("b.txt", b"world".as_slice())]);
        let info = locate_central_directory(&zip).unwrap();

        assert_eq!(info.entry_count, 2);
        assert!(info.central_dir_signature_valid);
        assert_eq!(info.eocd_offset, zip.len() - EOCD_MIN_LEN);
        assert!(describe_central_directory(&zip).contains("lists 2 entries"));
    }

    #[test]
    fn test_zeroed_central_directory_is_reported() {
        let mut zip = build_zip(&[("a.txt", b"hello".as_slice())]);
        let info = locate_central_directory(&zip).unwrap();
        let start = info.central_dir_offset as usize;
        zip[start..info.eocd_offset].fill(0);

        let damaged = locate_central_directory(&zip).unwrap();
        assert!(!damaged.central_dir_signature_valid);
        assert!(describe_central_directory(&zip).contains("damaged central directory"));
    }

    #[test]
    fn test_no_eocd() {
        assert!(locate_central_directory(b"not an archive").is_none());
        assert_eq!(
            describe_central_directory(b""),
            "no end-of-central-directory record found"
        );
    }
}
