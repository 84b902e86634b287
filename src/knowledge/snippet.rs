//! Keyword-anchored snippet extraction from a single large document.
//!
//! Used when a conversation is grounded on an uploaded document instead of
//! the curated index. All offsets and limits count characters, not bytes.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Returned when the document has no usable text.
pub const EMPTY_DOCUMENT: &str = "（文档文本为空或解析失败）";

/// Separator between keyword snippets.
pub const SNIPPET_SEPARATOR: &str = "\n\n---\n\n";

/// Separator between the head, middle and tail parts of the summary fallback.
pub const SUMMARY_SEPARATOR: &str = "\n...\n";

/// Length of each part of the summary fallback.
const SUMMARY_PART_CHARS: usize = 900;

/// Minimum token length, in characters.
const MIN_TOKEN_CHARS: usize = 2;

/// Limits applied by [`SnippetExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    /// Characters kept on each side of a keyword hit.
    pub window_size: usize,
    /// Maximum number of snippets collected.
    pub max_snippets: usize,
    /// Hard cap on the returned context.
    pub max_total_chars: usize,
    /// Characters taken from the start when the query has no usable keywords.
    pub head_fallback_chars: usize,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            window_size: 600,
            max_snippets: 6,
            max_total_chars: 2800,
            head_fallback_chars: 2500,
        }
    }
}

/// Derives grounding context from raw document text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnippetExtractor {
    config: SnippetConfig,
}

impl SnippetExtractor {
    #[must_use]
    pub fn new(config: SnippetConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SnippetConfig {
        &self.config
    }

    /// Extract the parts of `document` most related to `query`.
    ///
    /// Never fails: blank documents yield [`EMPTY_DOCUMENT`], and the result
    /// is always at most `max_total_chars` characters long.
    #[must_use]
    pub fn extract(&self, document: &str, query: &str) -> String {
        if document.trim().is_empty() {
            return EMPTY_DOCUMENT.to_string();
        }

        let keywords = query_keywords(query);
        let chars: Vec<char> = document.chars().collect();

        if keywords.is_empty() {
            let head = clip(&chars, 0, self.config.head_fallback_chars);
            return truncate_chars(&head, self.config.max_total_chars);
        }

        let folded: Vec<char> = chars.iter().copied().map(fold_char).collect();
        let mut snippets = Vec::new();

        for keyword in &keywords {
            let needle: Vec<char> = keyword.chars().collect();
            let Some(hit) = find_chars(&folded, &needle) else {
                continue;
            };

            let start = hit.saturating_sub(self.config.window_size);
            let end = chars.len().min(hit + self.config.window_size);
            let window: String = chars[start..end].iter().collect();
            snippets.push(window.trim().to_string());

            if snippets.len() >= self.config.max_snippets {
                break;
            }
        }

        let merged = if snippets.is_empty() {
            tracing::debug!(keywords = keywords.len(), "No keyword hits, using summary fallback");
            summary_fallback(&chars)
        } else {
            snippets.join(SNIPPET_SEPARATOR)
        };

        truncate_chars(&merged, self.config.max_total_chars)
    }
}

fn punctuation() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| {
        Regex::new(r"[[:punct:]，。！？、；：“”‘’（）【】《》]").expect("punctuation pattern is valid")
    })
}

/// Split a query into lowercase keywords of two or more characters.
///
/// ASCII and common CJK punctuation act as separators. Duplicates are
/// removed, keeping the first occurrence.
#[must_use]
pub fn query_keywords(query: &str) -> Vec<String> {
    let cleaned = punctuation().replace_all(query, " ");
    let mut seen = HashSet::new();

    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .map(|token| token.chars().map(fold_char).collect::<String>())
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

// One char in, one char out, so folded offsets line up with the original text.
fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Up to `max_len` characters starting at `start`; empty when `start` is past the end.
fn clip(chars: &[char], start: usize, max_len: usize) -> String {
    if start >= chars.len() {
        return String::new();
    }
    let end = chars.len().min(start.saturating_add(max_len));
    chars[start..end].iter().collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn summary_fallback(chars: &[char]) -> String {
    let len = chars.len();
    let head = clip(chars, 0, SUMMARY_PART_CHARS);
    let middle = clip(chars, (len / 2).saturating_sub(SUMMARY_PART_CHARS / 2), SUMMARY_PART_CHARS);
    let tail = clip(chars, len.saturating_sub(SUMMARY_PART_CHARS), SUMMARY_PART_CHARS);
    [head, middle, tail].join(SUMMARY_SEPARATOR)
}
