//! XML part salvage
//!
//! Recovers readable text and a balanced body from damaged Office XML parts.
//! Never fails: the worst case is a placeholder sentence naming the part.

pub mod markup;
pub mod part;
pub mod text;

use tracing::{debug, trace};

use crate::config::RepairConfig;

pub use markup::{balance_markup, is_well_formed, BalancedMarkup};
pub use part::{is_xml_part, PartKind, TextExtractor};

/// Thresholds for text extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalvageOptions {
    /// Below this many non-whitespace characters the placeholder is used
    pub min_readable_chars: usize,
    /// Shortest word kept by the generic extractor
    pub min_word_len: usize,
}

impl Default for SalvageOptions {
    fn default() -> Self {
        SalvageOptions::from(&RepairConfig::default())
    }
}

impl From<&RepairConfig> for SalvageOptions {
    fn from(config: &RepairConfig) -> Self {
        Self {
            min_readable_chars: config.min_readable_chars,
            min_word_len: config.min_generic_word_len,
        }
    }
}

/// Outcome of salvaging one part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalvagedPart {
    /// Extracted text, or the placeholder sentence
    pub text: String,
    /// Bytes to store for the part: balanced markup when a root element was
    /// found, otherwise a minimal part wrapping `text`
    pub content: Vec<u8>,
    /// Nothing readable was recovered
    pub placeholder: bool,
    /// A root element anchored the salvage
    pub anchored: bool,
    /// The body was cut back to a safe point
    pub cut: bool,
    /// Number of close tags appended
    pub synthesized: usize,
}

/// Salvage a part believed to be XML
pub fn salvage(bytes: &[u8], kind: PartKind, part_name: &str, options: &SalvageOptions) -> SalvagedPart {
    let decoded = String::from_utf8_lossy(bytes);
    let extractor = kind.extractor();

    let balanced = balance_markup(&decoded, extractor);
    let source: &str = balanced.as_ref().map(|b| b.markup.as_str()).unwrap_or(&decoded);
    let extracted = extractor.extract(source, options);

    let placeholder = text::readable_len(&extracted) < options.min_readable_chars;
    let text = if placeholder {
        trace!(part = part_name, chars = text::readable_len(&extracted), "Too little text, using placeholder");
        text::placeholder_sentence(part_name)
    } else {
        extracted
    };

    match balanced {
        Some(balanced) => {
            debug!(
                part = part_name,
                kind = %kind,
                root = %balanced.root,
                cut = balanced.truncated,
                closed = balanced.synthesized.len(),
                "Salvaged markup"
            );
            SalvagedPart {
                text,
                content: balanced.markup.into_bytes(),
                placeholder,
                anchored: true,
                cut: balanced.truncated,
                synthesized: balanced.synthesized.len(),
            }
        }
        None => {
            debug!(part = part_name, kind = %kind, placeholder, "No root element, wrapping text");
            SalvagedPart {
                content: extractor.wrap_text(part_name, &text).into_bytes(),
                text,
                placeholder,
                anchored: false,
                cut: false,
                synthesized: 0,
            }
        }
    }
}

/// Text recovered from a damaged part, or a placeholder sentence naming it
pub fn salvage_text(bytes: &[u8], kind: PartKind, part_name: &str) -> String {
    salvage(bytes, kind, part_name, &SalvageOptions::default()).text
}

/// Text of an intact part, without balancing or the placeholder threshold
pub fn extract_text(xml: &str, kind: PartKind) -> String {
    kind.extractor().extract(xml, &SalvageOptions::default())
}
