//! Tag balancing for truncated XML
//!
//! Balancing only needs to be good enough for regex extraction and for a
//! tolerant reader to open the part; it is not a validating parser.

use std::sync::OnceLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::part::TextExtractor;

const XML_PROLOG: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Start or end tag; quoted attribute values may contain `>`
fn tag_regex() -> &'static Regex {
    static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    TAG_REGEX.get_or_init(|| {
        Regex::new(r#"<(/?)([A-Za-z_][\w.\-]*(?::[A-Za-z_][\w.\-]*)?)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
            .expect("Invalid tag regex")
    })
}

fn prolog_regex() -> &'static Regex {
    static PROLOG_REGEX: OnceLock<Regex> = OnceLock::new();
    PROLOG_REGEX.get_or_init(|| Regex::new(r"<\?xml[^>]*\?>\s*").expect("Invalid prolog regex"))
}

#[derive(Debug, Clone, Copy)]
struct Tag<'a> {
    start: usize,
    end: usize,
    name: &'a str,
    closing: bool,
    self_closing: bool,
}

fn tags(text: &str) -> impl Iterator<Item = Tag<'_>> {
    tag_regex().captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let name = caps.get(2)?.as_str();
        let closing = caps.get(1).map(|m| !m.as_str().is_empty()).unwrap_or(false);
        let self_closing = caps
            .get(3)
            .map(|m| m.as_str().trim_end().ends_with('/'))
            .unwrap_or(false);
        Some(Tag { start: whole.start(), end: whole.end(), name, closing, self_closing })
    })
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn is_safe_closer(name: &str, closers: &[&str]) -> bool {
    closers
        .iter()
        .any(|closer| *closer == name || (!closer.contains(':') && *closer == local_name(name)))
}

/// Markup cut back to a safe point with its open elements closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancedMarkup {
    pub markup: String,
    /// Qualified name of the anchoring root element
    pub root: String,
    /// Part of the body after the cut point was dropped
    pub truncated: bool,
    /// Close tags appended, innermost first
    pub synthesized: Vec<String>,
}

/// Anchor on the first root element and close whatever the text leaves open
///
/// Returns `None` when no root element is present. When the root is already
/// closed the region up to its close tag is returned unchanged.
pub fn balance_markup(text: &str, extractor: &dyn TextExtractor) -> Option<BalancedMarkup> {
    let roots = extractor.root_names();
    let closers = extractor.safe_closers();

    let mut iter = tags(text);
    let anchor = iter.by_ref().find(|tag| {
        !tag.closing && (roots.is_empty() || roots.contains(&local_name(tag.name)))
    })?;

    let has_prolog = text[..anchor.start].contains("<?xml");
    let assemble = |end: usize, open: &[&str]| -> String {
        let body = prolog_regex().replace_all(&text[anchor.start..end], "");
        let mut markup = String::with_capacity(body.len() + XML_PROLOG.len() + open.len() * 16);
        if has_prolog {
            markup.push_str(XML_PROLOG);
            markup.push('\n');
        }
        markup.push_str(&body);
        for name in open.iter().rev() {
            markup.push_str("</");
            markup.push_str(name);
            markup.push('>');
        }
        markup
    };

    if anchor.self_closing {
        return Some(BalancedMarkup {
            markup: assemble(anchor.end, &[]),
            root: anchor.name.to_string(),
            truncated: false,
            synthesized: Vec::new(),
        });
    }

    let mut stack: Vec<&str> = vec![anchor.name];
    let mut last_end = anchor.end;
    let mut safe_point: Option<(usize, Vec<&str>)> = None;

    for tag in iter {
        last_end = tag.end;
        if tag.closing {
            if let Some(depth) = stack.iter().rposition(|open| *open == tag.name) {
                stack.truncate(depth);
            }
            if stack.is_empty() {
                return Some(BalancedMarkup {
                    markup: assemble(tag.end, &[]),
                    root: anchor.name.to_string(),
                    truncated: false,
                    synthesized: Vec::new(),
                });
            }
            if is_safe_closer(tag.name, closers) {
                safe_point = Some((tag.end, stack.clone()));
            }
        } else if !tag.self_closing {
            stack.push(tag.name);
        }
    }

    let (cut, open) = safe_point.unwrap_or((last_end, stack));
    let synthesized: Vec<String> = open.iter().rev().map(|name| name.to_string()).collect();
    Some(BalancedMarkup {
        markup: assemble(cut, &open),
        root: anchor.name.to_string(),
        truncated: cut < text.len(),
        synthesized,
    })
}

/// Strict well-formedness: one root, balanced tags, parseable throughout
pub fn is_well_formed(bytes: &[u8]) -> bool {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::Empty(_)) => {
                if depth == 0 {
                    roots += 1;
                }
            }
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => return roots == 1 && depth == 0,
            Ok(_) => {}
            Err(_) => return false,
        }
        if roots > 1 {
            return false;
        }
        buf.clear();
    }
}
