//! Result types of a repair run

use serde::Serialize;

/// How a recovered entry's content was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    /// Inflated (or stored) bytes, possibly a truncated prefix
    Decompressed,
    /// Balanced markup or wrapped text from a damaged XML part
    XmlSalvaged,
    /// Nothing recovered; stand-in payload
    Placeholder,
}

impl SourceKind {
    /// Higher is better when choosing between duplicates
    pub(crate) fn rank(self) -> u8 {
        match self {
            SourceKind::Decompressed => 2,
            SourceKind::XmlSalvaged => 1,
            SourceKind::Placeholder => 0,
        }
    }
}

/// One entry of the rebuilt archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredEntry {
    pub path: String,
    pub content: Vec<u8>,
    pub source_kind: SourceKind,
    /// Content is shorter than the original or failed an integrity check
    /// such as the CRC-32
    pub truncated: bool,
    /// Text produced by salvage, when salvage ran
    pub extracted_text: Option<String>,
}

/// Which entry listing the run used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryPath {
    /// Central directory listing
    Structured,
    /// Local header signature scan
    ScanFallback,
}

/// Office package family, guessed from the recovered paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentKind {
    Docx,
    Xlsx,
    Pptx,
    Zip,
}

impl DocumentKind {
    pub fn from_paths<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut kind = DocumentKind::Zip;
        for path in paths {
            let detected = if path.starts_with("word/") {
                DocumentKind::Docx
            } else if path.starts_with("xl/") {
                DocumentKind::Xlsx
            } else if path.starts_with("ppt/") {
                DocumentKind::Pptx
            } else {
                continue;
            };
            if kind == DocumentKind::Zip {
                kind = detected;
            } else if kind != detected {
                return DocumentKind::Zip;
            }
        }
        kind
    }
}

/// Per-entry line of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub path: String,
    pub source_kind: SourceKind,
    /// Shortened or damaged, see [`RecoveredEntry::truncated`]
    pub truncated: bool,
    pub size: usize,
}

impl From<&RecoveredEntry> for EntrySummary {
    fn from(entry: &RecoveredEntry) -> Self {
        Self {
            path: entry.path.clone(),
            source_kind: entry.source_kind,
            truncated: entry.truncated,
            size: entry.content.len(),
        }
    }
}

/// Aggregate outcome of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Distinct entry paths discovered
    pub total_entries_found: usize,
    /// Entries that are not placeholders
    pub recovered_count: usize,
    pub placeholder_count: usize,
    /// Issue log in processing order
    pub per_entry_notes: Vec<String>,
    pub recovery_path: RecoveryPath,
    pub document_kind: DocumentKind,
    pub entries: Vec<EntrySummary>,
}

impl RepairReport {
    /// No entry was recovered at all
    pub fn is_total_failure(&self) -> bool {
        self.recovered_count == 0
    }

    /// Entries that needed anything beyond a clean decompression
    pub fn damaged_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.truncated || e.source_kind != SourceKind::Decompressed)
            .count()
    }
}

/// Repaired archive plus its report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub repaired_bytes: Vec<u8>,
    pub report: RepairReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_kind_from_paths() {
        let docx = ["[Content_Types].xml", "_rels/.rels", "word/document.xml"];
        assert_eq!(DocumentKind::from_paths(docx), DocumentKind::Docx);
        assert_eq!(DocumentKind::from_paths(["xl/workbook.xml"]), DocumentKind::Xlsx);
        assert_eq!(DocumentKind::from_paths(["ppt/slides/slide1.xml"]), DocumentKind::Pptx);
        assert_eq!(DocumentKind::from_paths(["readme.txt"]), DocumentKind::Zip);
        assert_eq!(DocumentKind::from_paths(["word/a.xml", "xl/b.xml"]), DocumentKind::Zip);
    }

    #[test]
    fn test_report_serializes() {
        let report = RepairReport {
            total_entries_found: 1,
            recovered_count: 1,
            placeholder_count: 0,
            per_entry_notes: vec!["note".to_string()],
            recovery_path: RecoveryPath::ScanFallback,
            document_kind: DocumentKind::Docx,
            entries: vec![EntrySummary {
                path: "word/document.xml".to_string(),
                source_kind: SourceKind::XmlSalvaged,
                truncated: true,
                size: 10,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["recovery_path"], "ScanFallback");
        assert_eq!(json["entries"][0]["source_kind"], "XmlSalvaged");
        assert!(!report.is_total_failure());
        assert_eq!(report.damaged_count(), 1);
    }
}
