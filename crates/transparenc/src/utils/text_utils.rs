//! Text shaping for titles, previews and sponsor lines

use std::borrow::Cow;
use regex::Regex;
use lazy_static::lazy_static;

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

pub struct TextUtils;

impl TextUtils {
    /// Collapse runs of whitespace (including newlines) into single spaces
    pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
        if WHITESPACE_REGEX.is_match(text) {
            Cow::Owned(WHITESPACE_REGEX.replace_all(text, " ").trim().to_string())
        } else {
            Cow::Borrowed(text)
        }
    }

    /// Keep the first `max_chars` characters and append "..." when anything was cut.
    ///
    /// Counts chars, not bytes, so multi-byte text never splits mid-codepoint.
    pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
        match text.char_indices().nth(max_chars) {
            None => Cow::Borrowed(text),
            Some((cut, _)) => {
                let mut result = String::with_capacity(cut + 3);
                result.push_str(&text[..cut]);
                result.push_str("...");
                Cow::Owned(result)
            }
        }
    }

    /// Single-line preview: whitespace collapsed, then truncated.
    pub fn preview(text: &str, max_chars: usize) -> String {
        let flat = Self::normalize_whitespace(text);
        Self::truncate_chars(&flat, max_chars).into_owned()
    }

    pub fn is_blank(text: &str) -> bool {
        text.trim().is_empty()
    }
}
