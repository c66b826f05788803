//! Text normalization for review fields
//!
//! Turns raw review text into a canonical form used for deduplication and
//! downstream labeling: lowercase, no markup, no links, no punctuation, single
//! spaces. Letters and combining marks of every script are preserved so the
//! language filter can still see non-Latin segments.

use regex::Regex;
use std::sync::OnceLock;

/// Text normalization configuration
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    /// Convert to lowercase
    pub lowercase: bool,
    /// Replace `<...>` tags with a space
    pub strip_html: bool,
    /// Remove http(s) links, `www.` links, bare domains and domain-like paths.
    /// A period between two words ("good.in") alone is not treated as a link,
    /// and a path needs an alphabetic last label, so "4.5/5" survives.
    pub remove_urls: bool,
    /// Remove everything except letters, marks, digits and whitespace
    pub remove_punctuation: bool,
    /// Collapse whitespace runs and trim
    pub collapse_whitespace: bool,
}

/// What a raw field contained before normalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextScan {
    pub has_html: bool,
    pub has_link: bool,
}

static HTML_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static URL_REGEX: OnceLock<Regex> = OnceLock::new();
static PUNCTUATION_REGEX: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

fn html_tag_regex() -> &'static Regex {
    HTML_TAG_REGEX.get_or_init(|| {
        Regex::new(r"<[^>]+>").expect("Failed to compile HTML tag regex")
    })
}

fn url_regex() -> &'static Regex {
    URL_REGEX.get_or_init(|| {
        Regex::new(
            r"(?i)(?:https?://|www\.)\S+|\b[a-z0-9-]+(?:\.[a-z0-9-]+)*\.(?:com|org|net|edu|gov|io)\b(?:/\S*)?|\b[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}/\S*",
        )
        .expect("Failed to compile URL regex")
    })
}

fn punctuation_regex() -> &'static Regex {
    PUNCTUATION_REGEX.get_or_init(|| {
        Regex::new(r"[^\p{L}\p{M}\p{N}\s]").expect("Failed to compile punctuation regex")
    })
}

fn whitespace_regex() -> &'static Regex {
    WHITESPACE_REGEX.get_or_init(|| {
        Regex::new(r"\s+").expect("Failed to compile whitespace regex")
    })
}

impl TextNormalizer {
    pub fn new(
        lowercase: bool,
        strip_html: bool,
        remove_urls: bool,
        remove_punctuation: bool,
        collapse_whitespace: bool,
    ) -> Self {
        Self {
            lowercase,
            strip_html,
            remove_urls,
            remove_punctuation,
            collapse_whitespace,
        }
    }

    /// Every step enabled. This is what the review pipeline uses.
    pub fn full() -> Self {
        Self::new(true, true, true, true, true)
    }

    /// Only case folding and whitespace cleanup
    pub fn conservative() -> Self {
        Self::new(true, false, false, false, true)
    }

    /// Drop tags and links but keep case and punctuation, so sentence
    /// boundaries survive for the language filter
    pub fn markup_only() -> Self {
        Self::new(false, true, true, false, true)
    }

    /// Normalize an optional field; null becomes the empty string
    pub fn normalize_opt(&self, text: Option<&str>) -> String {
        text.map(|t| self.normalize(t)).unwrap_or_default()
    }

    /// Normalize text according to configuration
    ///
    /// Applies transformations in the following order:
    /// 1. Lowercase
    /// 2. HTML tag stripping
    /// 3. URL removal
    /// 4. Punctuation removal
    /// 5. Whitespace collapse and trim
    pub fn normalize(&self, text: &str) -> String {
        let mut buffer = String::with_capacity(text.len());
        self.normalize_into(text, &mut buffer);
        buffer
    }

    /// Normalize into an existing buffer, reusing its allocation
    pub fn normalize_into(&self, text: &str, buffer: &mut String) {
        buffer.clear();
        if self.lowercase {
            buffer.push_str(&text.to_lowercase());
        } else {
            buffer.push_str(text);
        }

        if self.strip_html {
            replace_in_place(buffer, html_tag_regex(), " ");
        }

        if self.remove_urls {
            replace_in_place(buffer, url_regex(), " ");
        }

        if self.remove_punctuation {
            replace_in_place(buffer, punctuation_regex(), " ");
        }

        if self.collapse_whitespace {
            replace_in_place(buffer, whitespace_regex(), " ");
            let trimmed = buffer.trim();
            if trimmed.len() != buffer.len() {
                *buffer = trimmed.to_string();
            }
        }
    }

    /// Report whether raw text carries markup or links
    pub fn scan(text: &str) -> TextScan {
        TextScan {
            has_html: html_tag_regex().is_match(text),
            has_link: url_regex().is_match(text),
        }
    }
}

fn replace_in_place(buffer: &mut String, regex: &Regex, with: &str) {
    if regex.is_match(buffer) {
        *buffer = regex.replace_all(buffer, with).into_owned();
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::full()
    }
}
