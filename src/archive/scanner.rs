//! Local file header scanning
//!
//! Walks an untrusted buffer byte by byte looking for `PK\x03\x04`. Each match
//! is parsed as a 30-byte local file header:
//!
//! | Offset | Size | Field              |
//! |--------|------|--------------------|
//! | 0x00   | 4    | Signature          |
//! | 0x06   | 2    | Flags              |
//! | 0x08   | 2    | Compression method |
//! | 0x0E   | 4    | CRC-32             |
//! | 0x12   | 4    | Compressed size    |
//! | 0x16   | 4    | Uncompressed size  |
//! | 0x1A   | 2    | Filename length    |
//! | 0x1C   | 2    | Extra field length |
//!
//! Signature bytes that happen to occur inside compressed data are accepted as
//! candidates; later stages reject whatever fails to decompress or parse.

use std::collections::HashMap;

use serde::Serialize;
use tracing::trace;

use super::detection::{find_signature, RecordBoundaries, ZIP_LOCAL_HEADER_SIG};
use super::types::{ArchiveEntry, CompressionMethod, FLAG_DATA_DESCRIPTOR};
use crate::common::binary::{read_lossy_string_at, read_u16_at, read_u32_at};
use crate::error::MalformedEntryError;

/// Fixed part of a local file header
pub const LOCAL_HEADER_LEN: usize = 30;

/// Counters collected during one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub bytes_scanned: usize,
    pub signatures_found: usize,
    pub entries_found: usize,
    pub directories_skipped: usize,
    pub malformed_discarded: usize,
}

/// Lazy iterator over the entries of a raw buffer, in ascending offset order
///
/// Restart by constructing a new scanner (or calling [`ByteScanner::restart`]);
/// the buffer is never modified.
pub struct ByteScanner<'a> {
    buf: &'a [u8],
    cursor: usize,
    stats: ScanStats,
    /// Built on the first entry whose declared size can't be used
    boundaries: Option<RecordBoundaries>,
}

impl<'a> ByteScanner<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            cursor: 0,
            stats: ScanStats::default(),
            boundaries: None,
        }
    }

    /// Rewind to the start of the buffer and clear the counters
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.stats = ScanStats::default();
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }
}

impl Iterator for ByteScanner<'_> {
    type Item = ArchiveEntry;

    fn next(&mut self) -> Option<ArchiveEntry> {
        loop {
            let Some(offset) = find_signature(self.buf, self.cursor, ZIP_LOCAL_HEADER_SIG) else {
                self.cursor = self.buf.len();
                self.stats.bytes_scanned = self.buf.len();
                return None;
            };
            // Advance one byte only: the next real header may start inside this one
            self.cursor = offset + 1;
            self.stats.bytes_scanned = self.cursor;
            self.stats.signatures_found += 1;

            match parse_header(self.buf, offset, &mut self.boundaries) {
                Ok(Some(entry)) => {
                    self.stats.entries_found += 1;
                    return Some(entry);
                }
                Ok(None) => {
                    self.stats.directories_skipped += 1;
                }
                Err(e) => {
                    trace!(offset, error = %e, "Discarding local header candidate");
                    self.stats.malformed_discarded += 1;
                }
            }
        }
    }
}

/// Scan the whole buffer
pub fn scan(buf: &[u8]) -> Vec<ArchiveEntry> {
    ByteScanner::new(buf).collect()
}

/// Scan the whole buffer and return the counters alongside the entries
pub fn scan_with_stats(buf: &[u8]) -> (Vec<ArchiveEntry>, ScanStats) {
    let mut scanner = ByteScanner::new(buf);
    let entries: Vec<ArchiveEntry> = scanner.by_ref().collect();
    (entries, scanner.stats())
}

/// First scanned entry whose path equals `path`
pub fn find_entry(buf: &[u8], path: &str) -> Option<ArchiveEntry> {
    ByteScanner::new(buf).find(|entry| entry.path == path)
}

/// First scanned entry for every path, from a single scan
pub fn index_entries(buf: &[u8]) -> HashMap<String, ArchiveEntry> {
    let mut index = HashMap::new();
    for entry in ByteScanner::new(buf) {
        index.entry(entry.path.clone()).or_insert(entry);
    }
    index
}

/// Parse the local header at `offset`
///
/// `Ok(None)` means the header is valid but describes a directory.
pub fn parse_local_header(
    buf: &[u8],
    offset: usize,
) -> Result<Option<ArchiveEntry>, MalformedEntryError> {
    parse_header(buf, offset, &mut None)
}

fn parse_header(
    buf: &[u8],
    offset: usize,
    boundaries: &mut Option<RecordBoundaries>,
) -> Result<Option<ArchiveEntry>, MalformedEntryError> {
    let header_end = offset
        .checked_add(LOCAL_HEADER_LEN)
        .filter(|&end| end <= buf.len())
        .ok_or(MalformedEntryError::TruncatedHeader { offset })?;

    let truncated = MalformedEntryError::TruncatedHeader { offset };
    let flags = read_u16_at(buf, offset + 6).ok_or(truncated)?;
    let method = read_u16_at(buf, offset + 8).ok_or(truncated)?;
    let crc32 = read_u32_at(buf, offset + 14).ok_or(truncated)?;
    let compressed_size = read_u32_at(buf, offset + 18).ok_or(truncated)? as usize;
    let uncompressed_size = read_u32_at(buf, offset + 22).ok_or(truncated)?;
    let name_len = read_u16_at(buf, offset + 26).ok_or(truncated)? as usize;
    let extra_len = read_u16_at(buf, offset + 28).ok_or(truncated)? as usize;

    if header_end + name_len > buf.len() {
        return Err(MalformedEntryError::NameOverrun { offset, name_len });
    }
    if name_len == 0 {
        return Err(MalformedEntryError::EmptyName { offset });
    }

    let path = read_lossy_string_at(buf, header_end, name_len)
        .ok_or(MalformedEntryError::NameOverrun { offset, name_len })?;
    if path.ends_with('/') {
        return Ok(None);
    }

    // Extra field may itself be cut off; data then starts (empty) at end of buffer
    let data_start = (header_end + name_len + extra_len).min(buf.len());

    let declared_end = data_start.checked_add(compressed_size);
    let (data_end, size_clamped) = match declared_end {
        Some(end) if compressed_size > 0 && end <= buf.len() => (end, false),
        _ => {
            let boundaries = boundaries.get_or_insert_with(|| RecordBoundaries::new(buf));
            (boundaries.next_after(data_start).unwrap_or(buf.len()), true)
        }
    };

    let has_descriptor = flags & FLAG_DATA_DESCRIPTOR != 0;

    Ok(Some(ArchiveEntry {
        path,
        compression_method: CompressionMethod::from_code(method),
        compressed_range: data_start..data_end,
        declared_uncompressed_size: if has_descriptor && uncompressed_size == 0 {
            None
        } else {
            Some(uncompressed_size as u64)
        },
        declared_crc32: if has_descriptor { None } else { Some(crc32) },
        header_offset: offset,
        flags,
        size_clamped,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::detection::ZIP_DATA_DESCRIPTOR_SIG;
    use crate::test_support::{build_docx, build_zip, build_zip_with, entry_data_range};
    use proptest::prelude::*;
    use std::time::{Duration, Instant};

    /// Hand-built local header for edge cases the zip writer won't produce
    fn local_header(name: &[u8], method: u16, compressed_size: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(ZIP_LOCAL_HEADER_SIG);
        out.extend_from_slice(&20u16.to_le_bytes()); // version
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]); // time/date
        out.extend_from_slice(&0u32.to_le_bytes()); // crc
        out.extend_from_slice(&compressed_size.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra
        out.extend_from_slice(name);
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn test_scan_healthy_archive_in_order() {
        let zip = build_docx(&["Hello world."]);
        let entries = scan(&zip);
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();

        assert_eq!(paths, vec!["[Content_Types].xml", "_rels/.rels", "word/document.xml"]);
        for entry in &entries {
            assert_eq!(entry.compression_method, CompressionMethod::Deflate);
            assert!(!entry.size_clamped);
            assert!(entry.declared_crc32.is_some());
        }

        let (_, range) = entry_data_range(&zip, "word/document.xml");
        assert_eq!(entries[2].compressed_range, range);
    }

    #[test]
    fn test_directories_are_skipped() {
        let mut buf = local_header(b"word/", 0, 0, b"");
        buf.extend(local_header(b"word/a.xml", 0, 3, b"abc"));

        let (entries, stats) = scan_with_stats(&buf);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "word/a.xml");
        assert_eq!(stats.directories_skipped, 1);
    }

    #[test]
    fn test_zero_size_is_clamped_to_next_signature() {
        let mut buf = local_header(b"a.xml", 0, 0, b"<a>payload</a>");
        let second = buf.len();
        buf.extend(local_header(b"b.xml", 0, 4, b"<b/>"));

        let entries = scan(&buf);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].size_clamped);
        assert_eq!(entries[0].compressed_range.end, second);
        assert_eq!(entries[0].data(&buf), b"<a>payload</a>");
    }

    #[test]
    fn test_oversized_declaration_is_clamped_to_end() {
        let buf = local_header(b"a.xml", 8, 0xFFFF_FF00, b"\x01\x02\x03");
        let entries = scan(&buf);

        assert_eq!(entries.len(), 1);
        assert!(entries[0].size_clamped);
        assert_eq!(entries[0].compressed_range.end, buf.len());
    }

    #[test]
    fn test_data_descriptor_entry_is_cut_at_descriptor() {
        let mut buf = local_header(b"word/document.xml", 8, 0, b"\x01\x02\x03\x04\x05");
        buf[6..8].copy_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
        let descriptor = buf.len();
        buf.extend_from_slice(ZIP_DATA_DESCRIPTOR_SIG);
        buf.extend_from_slice(&[0u8; 12]);

        let entries = scan(&buf);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].size_clamped);
        assert_eq!(entries[0].declared_crc32, None);
        assert_eq!(entries[0].compressed_range.end, descriptor);
        assert_eq!(entries[0].data(&buf), b"\x01\x02\x03\x04\x05");
    }

    #[test]
    fn test_many_zero_size_headers_scan_in_linear_time() {
        let count = 30_000;
        let buf = local_header(b"a.xml", 0, 0, b"").repeat(count);

        let started = Instant::now();
        let entries = scan(&buf);
        let elapsed = started.elapsed();

        assert_eq!(entries.len(), count);
        assert!(entries.iter().all(|e| e.size_clamped && e.compressed_range.is_empty()));
        assert!(elapsed < Duration::from_secs(5), "scan of {} bytes took {:?}", buf.len(), elapsed);
    }

    #[test]
    fn test_name_overrun_is_discarded() {
        let mut buf = local_header(b"abc", 0, 0, b"");
        // Claim a 500-byte name
        buf[26..28].copy_from_slice(&500u16.to_le_bytes());

        let (entries, stats) = scan_with_stats(&buf);
        assert!(entries.is_empty());
        assert_eq!(stats.malformed_discarded, 1);
        assert_eq!(
            parse_local_header(&buf, 0),
            Err(MalformedEntryError::NameOverrun { offset: 0, name_len: 500 })
        );
    }

    #[test]
    fn test_truncated_header_and_lossy_name() {
        let header = local_header(b"bad\xFFname.xml", 0, 0, b"");
        let mut buf = b"junk".to_vec();
        buf.extend_from_slice(&header);
        buf.extend_from_slice(b"PK\x03\x04\x14\x00");

        let (entries, stats) = scan_with_stats(&buf);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "bad\u{FFFD}name.xml");
        assert_eq!(entries[0].header_offset, 4);
        assert_eq!(stats.malformed_discarded, 1);
    }

    #[test]
    fn test_unknown_method_is_kept() {
        let buf = local_header(b"a.bin", 99, 3, b"xyz");
        let entries = scan(&buf);
        assert_eq!(entries[0].compression_method, CompressionMethod::Unknown(99));
    }

    #[test]
    fn test_find_entry_and_restart() {
        let zip = build_zip_with(
            &[("one.txt", b"1".as_slice()), ("two.txt", b"2".as_slice())],
            zip::CompressionMethod::Stored,
        );

        let entry = find_entry(&zip, "two.txt").unwrap();
        assert_eq!(entry.data(&zip), b"2");
        assert!(find_entry(&zip, "three.txt").is_none());

        let mut scanner = ByteScanner::new(&zip);
        assert_eq!(scanner.by_ref().count(), 2);
        assert_eq!(scanner.stats().entries_found, 2);
        scanner.restart();
        assert_eq!(scanner.next().map(|e| e.path), Some("one.txt".to_string()));
    }

    #[test]
    fn test_index_keeps_first_copy_of_each_path() {
        let mut buf = local_header(b"a.xml", 0, 5, b"<a/>1");
        buf.extend(local_header(b"b.xml", 0, 4, b"<b/>"));
        buf.extend(local_header(b"a.xml", 0, 5, b"<a/>2"));

        let index = index_entries(&buf);
        assert_eq!(index.len(), 2);
        assert_eq!(index["a.xml"].data(&buf), b"<a/>1");
        assert_eq!(index["b.xml"].data(&buf), b"<b/>");
    }

    #[test]
    fn test_nothing_found_in_random_bytes() {
        let noise: Vec<u8> = (0u32..50).map(|i| (i * 37 % 251) as u8).collect();
        assert!(scan(&noise).is_empty());
        assert!(scan(&[]).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            max_shrink_iters: 0,
            .. ProptestConfig::default()
        })]

        #[test]
        fn prop_ranges_stay_in_bounds(
            compressed_size in any::<u32>(),
            name_len in any::<u16>(),
            extra_len in any::<u16>(),
            cut in 0usize..200,
        ) {
            let mut buf = build_zip(&[("word/document.xml", b"<w:document/>".as_slice())]);
            buf[18..22].copy_from_slice(&compressed_size.to_le_bytes());
            buf[26..28].copy_from_slice(&name_len.to_le_bytes());
            buf[28..30].copy_from_slice(&extra_len.to_le_bytes());
            let keep = buf.len().saturating_sub(cut);
            buf.truncate(keep);

            for entry in scan(&buf) {
                prop_assert!(entry.compressed_range.start <= entry.compressed_range.end);
                prop_assert!(entry.compressed_range.end <= buf.len());
                prop_assert!(!entry.path.is_empty());
                prop_assert!(!entry.path.ends_with('/'));
            }
        }

        #[test]
        fn prop_arbitrary_bytes_never_overrun(
            mut bytes in proptest::collection::vec(any::<u8>(), 0..512),
            positions in proptest::collection::vec(0usize..512, 0..4),
        ) {
            // Plant signatures so the header parser actually runs
            for pos in positions {
                if pos + 4 <= bytes.len() {
                    bytes[pos..pos + 4].copy_from_slice(ZIP_LOCAL_HEADER_SIG);
                }
            }
            for entry in scan(&bytes) {
                prop_assert!(entry.compressed_range.end <= bytes.len());
                prop_assert!(entry.compressed_range.start <= entry.compressed_range.end);
            }
        }
    }
}
