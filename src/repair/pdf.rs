//! PDF header and trailer trimming
//!
//! Only removes bytes outside `%PDF-` ... `%%EOF`. Object and cross-reference
//! repair are not attempted.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::archive::detection::{find_signature, rfind_signature, PDF_MAGIC};

const PDF_EOF_MARKER: &[u8] = b"%%EOF";

/// Trimmed PDF bytes and what was removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfRepairOutcome {
    #[serde(skip)]
    pub repaired_bytes: Vec<u8>,
    pub leading_trimmed: usize,
    pub trailing_trimmed: usize,
    pub notes: Vec<String>,
}

/// Drop garbage before the first `%PDF-` and after the last `%%EOF`
///
/// One end-of-line after `%%EOF` is kept. Input without a header is returned
/// unchanged.
#[instrument(skip_all, fields(len = data.len()))]
pub fn repair_pdf(data: &[u8]) -> PdfRepairOutcome {
    let mut notes = Vec::new();

    let Some(start) = find_signature(data, 0, PDF_MAGIC) else {
        notes.push("No %PDF- header found; input returned unchanged".to_string());
        return PdfRepairOutcome {
            repaired_bytes: data.to_vec(),
            leading_trimmed: 0,
            trailing_trimmed: 0,
            notes,
        };
    };

    let end = match rfind_signature(data, PDF_EOF_MARKER).filter(|&eof| eof > start) {
        Some(eof) => {
            let mut end = eof + PDF_EOF_MARKER.len();
            match &data[end..] {
                [b'\r', b'\n', ..] => end += 2,
                [b'\n', ..] | [b'\r', ..] => end += 1,
                _ => {}
            }
            end
        }
        None => {
            notes.push("No %%EOF marker found; trailer left as is".to_string());
            data.len()
        }
    };

    let leading_trimmed = start;
    let trailing_trimmed = data.len() - end;
    if leading_trimmed > 0 {
        notes.push(format!("Removed {} byte(s) before the %PDF- header", leading_trimmed));
    }
    if trailing_trimmed > 0 {
        notes.push(format!("Removed {} byte(s) after the final %%EOF", trailing_trimmed));
    }
    debug!(leading_trimmed, trailing_trimmed, "PDF trimmed");

    PdfRepairOutcome {
        repaired_bytes: data[start..end].to_vec(),
        leading_trimmed,
        trailing_trimmed,
        notes,
    }
}
