//! Container format detection
//!
//! Magic signatures for the record types the scanner looks for, plus a
//! coarse in-memory sniff used by callers to pick a repair strategy.

use serde::Serialize;
use tracing::debug;

// =============================================================================
// Magic Signatures Reference
// =============================================================================
// Record            | Magic Bytes   | Hex           | Location
// ------------------|---------------|---------------|------------------
// Local header      | PK\x03\x04    | 50 4B 03 04   | Before each entry
// Data descriptor   | PK\x07\x08    | 50 4B 07 08   | After entry data (flag bit 3)
// Central directory | PK\x01\x02    | 50 4B 01 02   | Near end
// EOCD              | PK\x05\x06    | 50 4B 05 06   | Last 22..65557 bytes
// PDF header        | %PDF-         | 25 50 44 46 2D| Offset 0 (garbage may precede)
// =============================================================================

pub const ZIP_LOCAL_HEADER_SIG: &[u8] = &[0x50, 0x4B, 0x03, 0x04]; // PK\x03\x04
pub const ZIP_DATA_DESCRIPTOR_SIG: &[u8] = &[0x50, 0x4B, 0x07, 0x08]; // PK\x07\x08
pub const ZIP_CENTRAL_DIR_SIG: &[u8] = &[0x50, 0x4B, 0x01, 0x02]; // PK\x01\x02
pub const ZIP_EOCD_SIG: &[u8] = &[0x50, 0x4B, 0x05, 0x06]; // PK\x05\x06

pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Signatures that terminate an entry whose declared size cannot be trusted
pub const ENTRY_TERMINATORS: &[&[u8]] = &[
    ZIP_LOCAL_HEADER_SIG,
    ZIP_DATA_DESCRIPTOR_SIG,
    ZIP_CENTRAL_DIR_SIG,
    ZIP_EOCD_SIG,
];

/// How far into the buffer the container sniff looks
const SNIFF_WINDOW: usize = 1024;

/// Coarse container family of an uploaded buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContainerKind {
    Zip,
    Pdf,
    Unknown,
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerKind::Zip => write!(f, "ZIP"),
            ContainerKind::Pdf => write!(f, "PDF"),
            ContainerKind::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Signature Search
// =============================================================================

/// Find the first occurrence of `sig` at or after `from`
///
/// Byte-by-byte; signatures in damaged archives are not aligned to records.
pub fn find_signature(buf: &[u8], from: usize, sig: &[u8]) -> Option<usize> {
    if sig.is_empty() || buf.len() < sig.len() {
        return None;
    }
    let last = buf.len() - sig.len();
    (from..=last).find(|&i| buf[i] == sig[0] && &buf[i..i + sig.len()] == sig)
}

/// Find the last occurrence of `sig` in the buffer
pub fn rfind_signature(buf: &[u8], sig: &[u8]) -> Option<usize> {
    if sig.is_empty() || buf.len() < sig.len() {
        return None;
    }
    (0..=buf.len() - sig.len()).rev().find(|&i| &buf[i..i + sig.len()] == sig)
}

/// Sorted offsets of every entry-terminating signature in a buffer
///
/// Built in one pass so clamping many entries stays linear in the buffer size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBoundaries {
    offsets: Vec<usize>,
}

impl RecordBoundaries {
    pub fn new(buf: &[u8]) -> Self {
        let offsets = buf
            .windows(4)
            .enumerate()
            .filter(|(_, window)| window[0] == b'P' && ENTRY_TERMINATORS.contains(window))
            .map(|(offset, _)| offset)
            .collect();
        Self { offsets }
    }

    /// Offset of the nearest terminator at or after `from`
    pub fn next_after(&self, from: usize) -> Option<usize> {
        let index = self.offsets.partition_point(|&offset| offset < from);
        self.offsets.get(index).copied()
    }
}

// =============================================================================
// Detection Functions
// =============================================================================

/// Detect the container family from magic bytes
pub fn detect_container(buf: &[u8]) -> ContainerKind {
    let window = &buf[..buf.len().min(SNIFF_WINDOW)];

    if find_signature(window, 0, ZIP_LOCAL_HEADER_SIG).is_some()
        || buf.starts_with(ZIP_EOCD_SIG)
    {
        debug!("Detected ZIP container");
        return ContainerKind::Zip;
    }

    if find_signature(window, 0, PDF_MAGIC).is_some() {
        debug!("Detected PDF document");
        return ContainerKind::Pdf;
    }

    // Header area wiped but entries further in
    if find_signature(buf, 0, ZIP_LOCAL_HEADER_SIG).is_some() {
        debug!("Detected ZIP container past the sniff window");
        return ContainerKind::Zip;
    }

    ContainerKind::Unknown
}
