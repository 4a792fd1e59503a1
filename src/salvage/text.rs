//! Plain-text helpers shared by the part extractors

use std::borrow::Cow;
use std::sync::OnceLock;

use quick_xml::escape::{escape, unescape};
use regex::Regex;

/// Any markup construct: tags, comments, processing instructions
fn markup_regex() -> &'static Regex {
    static MARKUP_REGEX: OnceLock<Regex> = OnceLock::new();
    MARKUP_REGEX.get_or_init(|| Regex::new(r"<[^>]*>?").expect("Invalid markup regex"))
}

/// Decode XML entities, falling back to the five predefined ones when the
/// text contains an entity quick-xml does not know
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    match unescape(text) {
        Ok(decoded) => decoded,
        Err(_) => Cow::Owned(
            text.replace("&lt;", "<")
                .replace("&gt;", ">")
                .replace("&quot;", "\"")
                .replace("&apos;", "'")
                .replace("&amp;", "&"),
        ),
    }
}

/// Escape text for element content
pub fn escape_text(text: &str) -> Cow<'_, str> {
    escape(text)
}

/// Collapse every whitespace run to one space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join extracted run contents with single spaces
pub fn join_runs<'a, I>(runs: I) -> String
where
    I: IntoIterator<Item = Cow<'a, str>>,
{
    let joined: Vec<String> = runs
        .into_iter()
        .map(|run| collapse_whitespace(&run))
        .filter(|run| !run.is_empty())
        .collect();
    joined.join(" ")
}

/// Number of non-whitespace characters
pub fn readable_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Remove all markup, decode entities and keep alphabetic words of at least
/// `min_word_len` characters
pub fn strip_markup_words(text: &str, min_word_len: usize) -> String {
    let stripped = markup_regex().replace_all(text, " ");
    let decoded = decode_entities(&stripped);
    decoded
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| {
            word.chars().count() >= min_word_len && word.chars().all(char::is_alphabetic)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text reported when a part yields nothing readable
pub fn placeholder_sentence(part_name: &str) -> String {
    format!("[Content of {} could not be recovered]", part_name)
}
