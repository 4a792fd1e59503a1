//! Fresh archive assembly
//!
//! Writes recovered entries into a new ZIP in the order given. The output
//! never inherits anything from the damaged source: local headers, sizes,
//! checksums and the central directory are all regenerated by the writer.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod as ZipMethod, DateTime, ZipWriter};

use crate::repair::types::{RecoveredEntry, SourceKind};

/// A ZIP with no entries: just the end-of-central-directory record
pub const EMPTY_ARCHIVE: [u8; 22] = [
    0x50, 0x4B, 0x05, 0x06, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Extensions whose payload is already compressed
const STORED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "wdp", "jfif", "zip", "gz", "7z", "mp3", "mp4", "m4a", "odttf",
];

/// Pick store or deflate for one entry
pub fn compression_for(entry: &RecoveredEntry) -> ZipMethod {
    if entry.content.is_empty() || entry.source_kind == SourceKind::Placeholder {
        return ZipMethod::Stored;
    }
    let lower = entry.path.to_ascii_lowercase();
    let extension = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    if STORED_EXTENSIONS.contains(&extension) {
        ZipMethod::Stored
    } else {
        ZipMethod::Deflated
    }
}

/// An entry the writer could not store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: String,
    pub reason: String,
}

/// Rebuilt archive bytes and the entries missing from them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuiltArchive {
    pub bytes: Vec<u8>,
    pub skipped: Vec<SkippedEntry>,
}

/// Compose a new archive from recovered entries
///
/// Deterministic: the same ordered input yields byte-identical output.
/// A repeated path keeps its first occurrence. Repeats and entries the
/// writer rejects are returned in `skipped`.
pub fn rebuild(entries: &[RecoveredEntry]) -> RebuiltArchive {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut written: HashSet<&str> = HashSet::with_capacity(entries.len());
    let mut skipped = Vec::new();

    for entry in entries {
        if !written.insert(entry.path.as_str()) {
            warn!(path = %entry.path, "Skipping repeated entry path");
            skipped.push(SkippedEntry {
                path: entry.path.clone(),
                reason: "repeated path".to_string(),
            });
            continue;
        }
        let options = SimpleFileOptions::default()
            .compression_method(compression_for(entry))
            .last_modified_time(DateTime::default())
            .large_file(entry.content.len() as u64 >= u32::MAX as u64);

        if let Err(e) = writer.start_file(entry.path.as_str(), options) {
            warn!(path = %entry.path, error = %e, "Skipping entry rejected by archive writer");
            skipped.push(SkippedEntry {
                path: entry.path.clone(),
                reason: format!("rejected by archive writer: {}", e),
            });
            continue;
        }
        if let Err(e) = writer.write_all(&entry.content) {
            warn!(path = %entry.path, error = %e, "Failed to write entry payload");
            skipped.push(SkippedEntry {
                path: entry.path.clone(),
                reason: format!("payload write failed: {}", e),
            });
        }
    }

    match writer.finish() {
        Ok(cursor) => {
            let bytes = cursor.into_inner();
            debug!(entries = entries.len(), skipped = skipped.len(), bytes = bytes.len(), "Archive rebuilt");
            RebuiltArchive { bytes, skipped }
        }
        Err(e) => {
            warn!(error = %e, "Archive writer failed to finish, emitting empty archive");
            let reason = format!("archive writer failed to finish: {}", e);
            RebuiltArchive {
                bytes: EMPTY_ARCHIVE.to_vec(),
                skipped: entries
                    .iter()
                    .map(|entry| SkippedEntry { path: entry.path.clone(), reason: reason.clone() })
                    .collect(),
            }
        }
    }
}
