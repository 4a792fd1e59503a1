//! Repair pipeline
//!
//! ```text
//! Start -> StructuredOpenAttempted -> StructuredOk  -> EntriesProcessed -> Rebuilt -> Done
//!                                  \-> ScanFallback -/
//! ```
//!
//! The structured path trusts the central directory and only drops to raw
//! bytes for the entries it cannot read. The scan path treats every local
//! header found by [`ByteScanner`] as a candidate. Either way each candidate
//! becomes exactly one [`RecoveredEntry`], and the notes explain every entry
//! that did not come out as a clean decompression.

use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read};

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

use super::types::{
    DocumentKind, EntrySummary, RecoveredEntry, RecoveryPath, RepairOutcome, RepairReport,
    SourceKind,
};
use crate::archive::decompress::{decompress_with, Inflated, ProbeLimits};
use crate::archive::rebuild::{rebuild, RebuiltArchive};
use crate::archive::scanner::{index_entries, scan_with_stats, ByteScanner};
use crate::archive::types::ArchiveEntry;
use crate::archive::zip::describe_central_directory;
use crate::config::RepairConfig;
use crate::error::StructuredOpenError;
use crate::salvage::{is_well_formed, is_xml_part, salvage, PartKind, SalvageOptions};

/// Upper bound on the buffer reserved from an untrusted declared size
const INITIAL_READ_CAPACITY: usize = 1024 * 1024;

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    StructuredOpenAttempted,
    StructuredOk,
    ScanFallback,
    EntriesProcessed,
    Rebuilt,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Something to turn into one recovered entry
#[derive(Debug)]
enum Candidate {
    /// Read and CRC-checked by the structured reader
    Extracted { path: String, data: Vec<u8> },
    /// Raw entry bytes located by a local header
    Raw(ArchiveEntry),
    /// Listed by the central directory but unreadable and not locatable
    Missing { path: String, reason: String },
}

impl Candidate {
    fn path(&self) -> &str {
        match self {
            Candidate::Extracted { path, .. } | Candidate::Missing { path, .. } => path,
            Candidate::Raw(entry) => &entry.path,
        }
    }
}

/// One processed candidate and the notes it produced
struct Processed {
    entry: RecoveredEntry,
    notes: Vec<String>,
}

/// One repair run over an immutable buffer
///
/// Consumed by [`RepairPipeline::run`]; every run starts from fresh state.
pub struct RepairPipeline<'a> {
    raw: &'a [u8],
    config: &'a RepairConfig,
    limits: ProbeLimits,
    options: SalvageOptions,
    stage: Stage,
    notes: Vec<String>,
}

impl<'a> RepairPipeline<'a> {
    pub fn new(raw: &'a [u8], config: &'a RepairConfig) -> Self {
        Self {
            raw,
            config,
            limits: ProbeLimits::from(config),
            options: SalvageOptions::from(config),
            stage: Stage::Start,
            notes: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "Pipeline stage");
        self.stage = next;
    }

    fn note(&mut self, note: String) {
        debug!(note = %note, "Repair note");
        self.notes.push(note);
    }

    /// Run every stage and return the rebuilt archive with its report
    pub fn run(mut self) -> RepairOutcome {
        self.advance(Stage::StructuredOpenAttempted);

        let structured = match self.open_structured() {
            Ok(candidates) if candidates.is_empty() && ByteScanner::new(self.raw).next().is_some() => {
                self.note(
                    "Central directory lists no files but local headers are present; scanning instead"
                        .to_string(),
                );
                None
            }
            Ok(candidates) => Some(candidates),
            Err(e) => {
                warn!(error = %e, "Structured open failed");
                self.note(format!("{}; falling back to signature scan", e));
                None
            }
        };

        let (candidates, recovery_path) = match structured {
            Some(candidates) => {
                self.advance(Stage::StructuredOk);
                (candidates, RecoveryPath::Structured)
            }
            None => {
                self.advance(Stage::ScanFallback);
                (self.scan_candidates(), RecoveryPath::ScanFallback)
            }
        };

        let processed = self.process(candidates);
        self.advance(Stage::EntriesProcessed);

        let entries = self.collect_entries(processed);
        let RebuiltArchive { bytes: repaired_bytes, skipped } = rebuild(&entries);
        for entry in skipped {
            self.note(format!(
                "{}: left out of the rebuilt archive ({})",
                entry.path, entry.reason
            ));
        }
        self.advance(Stage::Rebuilt);

        let report = self.report(&entries, recovery_path);
        self.advance(Stage::Done);

        info!(
            total = report.total_entries_found,
            recovered = report.recovered_count,
            placeholders = report.placeholder_count,
            path = ?report.recovery_path,
            "Repair finished"
        );

        RepairOutcome { repaired_bytes, report }
    }

    /// List and read entries through the central directory
    fn open_structured(&mut self) -> Result<Vec<Candidate>, StructuredOpenError> {
        let raw = self.raw;
        let mut archive = ZipArchive::new(Cursor::new(raw))?;
        let limit = self.config.max_inflated_size;
        let mut candidates = Vec::with_capacity(archive.len());
        // Local headers by path, scanned once on the first unreadable entry
        let mut local_headers: Option<HashMap<String, ArchiveEntry>> = None;

        for index in 0..archive.len() {
            let Some(path) = archive.name_for_index(index).map(str::to_string) else {
                continue;
            };
            if path.is_empty() || path.ends_with('/') {
                continue;
            }

            let read = archive.by_index(index).map_err(|e| e.to_string()).and_then(|mut file| {
                let capacity = (file.size() as usize).min(limit).min(INITIAL_READ_CAPACITY);
                let mut data = Vec::with_capacity(capacity);
                file.by_ref()
                    .take((limit as u64).saturating_add(1))
                    .read_to_end(&mut data)
                    .map_err(|e| e.to_string())?;
                if data.len() > limit {
                    return Err(format!("inflated size exceeds {} bytes", limit));
                }
                Ok(data)
            });

            match read {
                Ok(data) => candidates.push(Candidate::Extracted { path, data }),
                Err(reason) => {
                    debug!(path = %path, reason = %reason, "Structured read failed, locating raw entry");
                    let located = local_headers
                        .get_or_insert_with(|| index_entries(raw))
                        .get(&path)
                        .cloned();
                    match located {
                        Some(entry) => {
                            self.note(format!(
                                "{}: structured read failed ({}); recovering from raw entry bytes",
                                path, reason
                            ));
                            candidates.push(Candidate::Raw(entry));
                        }
                        None => candidates.push(Candidate::Missing { path, reason }),
                    }
                }
            }
        }

        Ok(candidates)
    }

    fn scan_candidates(&mut self) -> Vec<Candidate> {
        self.note(describe_central_directory(self.raw));
        let (entries, stats) = scan_with_stats(self.raw);
        debug!(
            signatures = stats.signatures_found,
            entries = stats.entries_found,
            directories = stats.directories_skipped,
            malformed = stats.malformed_discarded,
            "Signature scan complete"
        );
        if stats.malformed_discarded > 0 {
            self.note(format!(
                "Discarded {} malformed local header candidate(s)",
                stats.malformed_discarded
            ));
        }
        entries.into_iter().map(Candidate::Raw).collect()
    }

    fn process(&self, candidates: Vec<Candidate>) -> Vec<Processed> {
        let raw = self.raw;
        let config = self.config;
        let limits = &self.limits;
        let options = &self.options;

        // Ordered collect keeps discovery order regardless of completion order
        if config.parallel {
            candidates
                .into_par_iter()
                .map(|candidate| process_candidate(raw, candidate, config, limits, options))
                .collect()
        } else {
            candidates
                .into_iter()
                .map(|candidate| process_candidate(raw, candidate, config, limits, options))
                .collect()
        }
    }

    /// Merge notes and keep the best copy of each path
    fn collect_entries(&mut self, processed: Vec<Processed>) -> Vec<RecoveredEntry> {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(processed.len());
        let mut entries: Vec<RecoveredEntry> = Vec::with_capacity(processed.len());

        for Processed { entry, notes } in processed {
            for note in notes {
                self.note(note);
            }
            match index.get(&entry.path) {
                Some(&position) => {
                    let kept = &entries[position];
                    let better = entry.source_kind.rank() > kept.source_kind.rank()
                        || (entry.source_kind == kept.source_kind && kept.truncated && !entry.truncated);
                    if better {
                        self.note(format!("{}: duplicate entry replaces an earlier, worse copy", entry.path));
                        entries[position] = entry;
                    } else {
                        self.note(format!("{}: discarded duplicate entry", entry.path));
                    }
                }
                None => {
                    index.insert(entry.path.clone(), entries.len());
                    entries.push(entry);
                }
            }
        }
        entries
    }

    fn report(&mut self, entries: &[RecoveredEntry], recovery_path: RecoveryPath) -> RepairReport {
        let placeholder_count = entries
            .iter()
            .filter(|e| e.source_kind == SourceKind::Placeholder)
            .count();
        let recovered_count = entries.len() - placeholder_count;

        if entries.is_empty() {
            self.note("No archive entries found; nothing could be recovered".to_string());
        } else if recovered_count == 0 {
            self.note(format!("None of the {} entries could be recovered", entries.len()));
        }

        RepairReport {
            total_entries_found: entries.len(),
            recovered_count,
            placeholder_count,
            per_entry_notes: std::mem::take(&mut self.notes),
            recovery_path,
            document_kind: DocumentKind::from_paths(entries.iter().map(|e| e.path.as_str())),
            entries: entries.iter().map(EntrySummary::from).collect(),
        }
    }
}

// =============================================================================
// Per-entry recovery
// =============================================================================

fn process_candidate(
    raw: &[u8],
    candidate: Candidate,
    config: &RepairConfig,
    limits: &ProbeLimits,
    options: &SalvageOptions,
) -> Processed {
    let xml = is_xml_part(candidate.path());
    match candidate {
        Candidate::Extracted { path, data } => decompressed(path, data, xml, options),
        Candidate::Raw(entry) => process_raw(raw, entry, xml, config, limits, options),
        Candidate::Missing { path, reason } => {
            let note = format!("{}: unreadable and no local header found ({})", path, reason);
            if xml {
                salvaged(path, &[], true, options, note)
            } else {
                placeholder(path, note)
            }
        }
    }
}

fn process_raw(
    raw: &[u8],
    entry: ArchiveEntry,
    xml: bool,
    config: &RepairConfig,
    limits: &ProbeLimits,
    options: &SalvageOptions,
) -> Processed {
    let data = entry.data(raw);
    let method = entry.compression_method;
    debug!(
        path = %entry.path,
        offset = entry.header_offset,
        method = method.code(),
        len = entry.compressed_len(),
        clamped = entry.size_clamped,
        "Recovering raw entry"
    );

    let inflated = match decompress_with(data, method, entry.declared_uncompressed_size, limits) {
        Ok(inflated) => inflated,
        Err(e) => {
            let note = format!("{}: {} ({})", entry.path, e, method);
            return if xml {
                salvaged(entry.path, data, true, options, note)
            } else {
                placeholder(entry.path, note)
            };
        }
    };

    let Inflated { data: bytes, complete, skipped, .. } = inflated;
    let crc_mismatch = match entry.declared_crc32 {
        Some(expected) if config.verify_checksums && complete => crc32fast::hash(&bytes) != expected,
        _ => false,
    };

    if complete && !crc_mismatch {
        let mut processed = decompressed(entry.path, bytes, xml, options);
        if skipped > 0 {
            let note = format!(
                "{}: skipped {} leading byte(s) before the deflate stream",
                processed.entry.path, skipped
            );
            processed.notes.insert(0, note);
        }
        return processed;
    }

    let note = if crc_mismatch {
        format!("{}: CRC-32 mismatch after inflation; content is damaged", entry.path)
    } else {
        format!(
            "{}: deflate stream is truncated; recovered {} byte(s)",
            entry.path,
            bytes.len()
        )
    };

    if xml {
        salvaged(entry.path, &bytes, true, options, note)
    } else {
        Processed {
            entry: RecoveredEntry {
                path: entry.path,
                content: bytes,
                source_kind: SourceKind::Decompressed,
                truncated: true,
                extracted_text: None,
            },
            notes: vec![note],
        }
    }
}

/// Clean bytes; XML parts that fail to parse still go through salvage
fn decompressed(path: String, data: Vec<u8>, xml: bool, options: &SalvageOptions) -> Processed {
    if xml && !data.is_empty() && !is_well_formed(&data) {
        let note = format!("{}: decompressed but not well-formed XML", path);
        return salvaged(path, &data, false, options, note);
    }
    Processed {
        entry: RecoveredEntry {
            path,
            content: data,
            source_kind: SourceKind::Decompressed,
            truncated: false,
            extracted_text: None,
        },
        notes: Vec::new(),
    }
}

fn salvaged(
    path: String,
    bytes: &[u8],
    truncated: bool,
    options: &SalvageOptions,
    note: String,
) -> Processed {
    let part = salvage(bytes, PartKind::from_path(&path), &path, options);
    let source_kind = if part.placeholder && !part.anchored {
        SourceKind::Placeholder
    } else {
        SourceKind::XmlSalvaged
    };
    let outcome = match source_kind {
        SourceKind::Placeholder => format!("{}: no text recovered, placeholder part written", path),
        _ if part.cut => format!(
            "{}: salvaged XML cut back to a safe point, {} tag(s) closed",
            path, part.synthesized
        ),
        _ => format!("{}: salvaged XML", path),
    };
    Processed {
        entry: RecoveredEntry {
            path,
            content: part.content,
            source_kind,
            truncated: truncated || part.cut,
            extracted_text: Some(part.text),
        },
        notes: vec![note, outcome],
    }
}

fn placeholder(path: String, note: String) -> Processed {
    let outcome = format!("{}: binary part not recoverable, empty placeholder written", path);
    Processed {
        entry: RecoveredEntry {
            path,
            content: Vec::new(),
            source_kind: SourceKind::Placeholder,
            truncated: false,
            extracted_text: None,
        },
        notes: vec![note, outcome],
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Repair a damaged archive with default settings
pub fn repair(raw: &[u8]) -> RepairOutcome {
    repair_with_config(raw, &RepairConfig::default())
}

/// Repair a damaged archive
///
/// Never fails: an unrecoverable input yields an empty archive and a report
/// whose `is_total_failure()` is true.
#[instrument(skip_all, fields(len = raw.len()))]
pub fn repair_with_config(raw: &[u8], config: &RepairConfig) -> RepairOutcome {
    RepairPipeline::new(raw, config).run()
}
