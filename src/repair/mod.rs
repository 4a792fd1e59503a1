//! Repair entry points
//!
//! [`repair`] rebuilds a damaged ZIP-based Office document; [`repair_pdf`]
//! trims a PDF to its header and final trailer. Neither performs I/O.

pub mod pdf;
pub mod pipeline;
pub mod types;

pub use pdf::{repair_pdf, PdfRepairOutcome};
pub use pipeline::{repair, repair_with_config, RepairPipeline, Stage};
pub use types::{
    DocumentKind, EntrySummary, RecoveredEntry, RecoveryPath, RepairOutcome, RepairReport,
    SourceKind,
};
