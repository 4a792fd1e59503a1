//! Corruption recovery for ZIP-based Office documents
//!
//! ```text
//! raw bytes -> RepairPipeline -> {ByteScanner -> entries}
//!           -> EntryDecompressor (+ XML salvage on failure)
//!           -> ArchiveRebuilder -> repaired bytes + RepairReport
//! ```
//!
//! The library performs no I/O; [`cli`] is the file-based front end.

pub mod archive;
pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod logging;
pub mod repair;
pub mod salvage;

#[cfg(test)]
mod test_support;

pub use archive::detection::{detect_container, ContainerKind};
pub use config::RepairConfig;
pub use repair::{
    repair, repair_pdf, repair_with_config, PdfRepairOutcome, RepairOutcome, RepairReport,
};
pub use salvage::{salvage_text, PartKind};
