//! Part kinds and their text extractors
//!
//! | kind    | paths                                             | text elements        |
//! |---------|---------------------------------------------------|----------------------|
//! | Word    | word/document, header*, footer*, notes, comments  | `w:t`                |
//! | Sheet   | xl/worksheets/*, xl/sharedStrings                 | `v`, `t` (non-numeric) |
//! | Slide   | ppt/slides/*, notesSlides, layouts, masters       | `a:t`                |
//! | Generic | any other `.xml`, `.rels`, `.vml`                 | tag-stripped words   |

use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::text::{decode_entities, escape_text, join_runs, strip_markup_words};
use super::SalvageOptions;

/// Extensions treated as XML parts
const XML_EXTENSIONS: &[&str] = &["xml", "rels", "vml"];

const XML_PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const NS_WORD: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_SHEET: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_DRAWING: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PRESENTATION: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

/// Whether the path names an XML part
pub fn is_xml_part(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower
        .rsplit_once('.')
        .map(|(_, ext)| XML_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Which extractor handles a part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PartKind {
    Word,
    Sheet,
    Slide,
    Generic,
}

impl PartKind {
    /// Classify by archive path
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if !lower.ends_with(".xml") || lower.contains("/_rels/") {
            return PartKind::Generic;
        }
        let (dir, file) = lower.rsplit_once('/').unwrap_or(("", lower.as_str()));
        let stem = file.trim_end_matches(".xml");
        let stem_base = stem.trim_end_matches(|c: char| c.is_ascii_digit());

        match dir {
            "word" | "word/glossary"
                if matches!(
                    stem_base,
                    "document" | "header" | "footer" | "footnotes" | "endnotes" | "comments"
                ) =>
            {
                PartKind::Word
            }
            "xl/worksheets" => PartKind::Sheet,
            "xl" if stem == "sharedstrings" => PartKind::Sheet,
            "ppt/slides" | "ppt/notesslides" | "ppt/slidelayouts" | "ppt/slidemasters" => {
                PartKind::Slide
            }
            _ => PartKind::Generic,
        }
    }

    /// The extractor for this kind
    pub fn extractor(self) -> &'static dyn TextExtractor {
        match self {
            PartKind::Word => &WordExtractor,
            PartKind::Sheet => &SheetExtractor,
            PartKind::Slide => &SlideExtractor,
            PartKind::Generic => &GenericExtractor,
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartKind::Word => write!(f, "word-processing"),
            PartKind::Sheet => write!(f, "spreadsheet"),
            PartKind::Slide => write!(f, "presentation"),
            PartKind::Generic => write!(f, "generic"),
        }
    }
}

/// Per-kind knowledge needed to salvage a damaged part
pub trait TextExtractor: Sync {
    fn kind(&self) -> PartKind;

    /// Local names of elements that may anchor salvage; empty accepts the
    /// first element of any name
    fn root_names(&self) -> &'static [&'static str];

    /// Close tags after which the markup can be cut without losing structure.
    /// Unprefixed entries match on local name.
    fn safe_closers(&self) -> &'static [&'static str];

    /// Readable text from (possibly balanced) markup, in document order
    fn extract(&self, xml: &str, options: &SalvageOptions) -> String;

    /// Minimal well-formed part carrying `text`
    fn wrap_text(&self, part_name: &str, text: &str) -> String;
}

/// Contents of every element matched by `pattern`'s first group
fn runs<'a>(pattern: &'static Regex, xml: &'a str) -> impl Iterator<Item = Cow<'a, str>> {
    pattern
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()))
}

// =============================================================================
// Word
// =============================================================================

pub struct WordExtractor;

fn word_run_regex() -> &'static Regex {
    static WORD_RUN_REGEX: OnceLock<Regex> = OnceLock::new();
    WORD_RUN_REGEX
        .get_or_init(|| Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").expect("Invalid w:t regex"))
}

impl TextExtractor for WordExtractor {
    fn kind(&self) -> PartKind {
        PartKind::Word
    }

    fn root_names(&self) -> &'static [&'static str] {
        &["document", "hdr", "ftr", "footnotes", "endnotes", "comments"]
    }

    fn safe_closers(&self) -> &'static [&'static str] {
        &["w:p"]
    }

    fn extract(&self, xml: &str, _options: &SalvageOptions) -> String {
        join_runs(runs(word_run_regex(), xml))
    }

    fn wrap_text(&self, _part_name: &str, text: &str) -> String {
        format!(
            r#"{}
<w:document xmlns:w="{}"><w:body><w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p></w:body></w:document>"#,
            XML_PROLOG,
            NS_WORD,
            escape_text(text)
        )
    }
}

// =============================================================================
// Spreadsheet
// =============================================================================

pub struct SheetExtractor;

fn sheet_value_regex() -> &'static Regex {
    static SHEET_VALUE_REGEX: OnceLock<Regex> = OnceLock::new();
    SHEET_VALUE_REGEX.get_or_init(|| {
        Regex::new(r"<(?:[A-Za-z_][\w.\-]*:)?(?:v|t)(?:\s[^>]*)?>([^<]*)</(?:[A-Za-z_][\w.\-]*:)?(?:v|t)>")
            .expect("Invalid cell value regex")
    })
}

/// Cell values like `42`, `-1.5`, `3E+2`
fn is_numeric(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && value.parse::<f64>().is_ok()
}

impl TextExtractor for SheetExtractor {
    fn kind(&self) -> PartKind {
        PartKind::Sheet
    }

    fn root_names(&self) -> &'static [&'static str] {
        &["worksheet", "sst"]
    }

    fn safe_closers(&self) -> &'static [&'static str] {
        &["c", "si", "row"]
    }

    fn extract(&self, xml: &str, _options: &SalvageOptions) -> String {
        join_runs(runs(sheet_value_regex(), xml).filter(|value| !is_numeric(value)))
    }

    fn wrap_text(&self, part_name: &str, text: &str) -> String {
        let text = escape_text(text);
        if part_name.to_ascii_lowercase().ends_with("sharedstrings.xml") {
            format!(
                r#"{}
<sst xmlns="{}" count="1" uniqueCount="1"><si><t xml:space="preserve">{}</t></si></sst>"#,
                XML_PROLOG, NS_SHEET, text
            )
        } else {
            format!(
                r#"{}
<worksheet xmlns="{}"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c></row></sheetData></worksheet>"#,
                XML_PROLOG, NS_SHEET, text
            )
        }
    }
}

// =============================================================================
// Presentation
// =============================================================================

pub struct SlideExtractor;

fn slide_run_regex() -> &'static Regex {
    static SLIDE_RUN_REGEX: OnceLock<Regex> = OnceLock::new();
    SLIDE_RUN_REGEX
        .get_or_init(|| Regex::new(r"<a:t(?:\s[^>]*)?>([^<]*)</a:t>").expect("Invalid a:t regex"))
}

impl TextExtractor for SlideExtractor {
    fn kind(&self) -> PartKind {
        PartKind::Slide
    }

    fn root_names(&self) -> &'static [&'static str] {
        &["sld", "notes", "sldLayout", "sldMaster"]
    }

    fn safe_closers(&self) -> &'static [&'static str] {
        &["a:r", "a:p", "p:sp"]
    }

    fn extract(&self, xml: &str, _options: &SalvageOptions) -> String {
        join_runs(runs(slide_run_regex(), xml))
    }

    fn wrap_text(&self, part_name: &str, text: &str) -> String {
        let root = if part_name.to_ascii_lowercase().starts_with("ppt/notesslides/") {
            "p:notes"
        } else {
            "p:sld"
        };
        format!(
            r#"{}
<{root} xmlns:a="{}" xmlns:p="{}"><p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></{root}>"#,
            XML_PROLOG,
            NS_DRAWING,
            NS_PRESENTATION,
            escape_text(text),
            root = root
        )
    }
}

// =============================================================================
// Generic
// =============================================================================

pub struct GenericExtractor;

impl TextExtractor for GenericExtractor {
    fn kind(&self) -> PartKind {
        PartKind::Generic
    }

    fn root_names(&self) -> &'static [&'static str] {
        &[]
    }

    fn safe_closers(&self) -> &'static [&'static str] {
        &[]
    }

    fn extract(&self, xml: &str, options: &SalvageOptions) -> String {
        strip_markup_words(xml, options.min_word_len)
    }

    fn wrap_text(&self, _part_name: &str, text: &str) -> String {
        format!("{}\n<recovered>{}</recovered>", XML_PROLOG, escape_text(text))
    }
}
