//! Sentence-aligned chunking of long input.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SENTENCE_BREAK: Regex = Regex::new(r"[.!?]\s+").unwrap();
}

/// Split `text` into chunks of at most `max_len` characters.
///
/// Text that already fits is returned as-is. Otherwise sentences (split after
/// `.`, `!` or `?` followed by whitespace) are packed greedily, joined by a
/// single space that counts toward the limit. A sentence longer than
/// `max_len` becomes its own chunk and is never cut.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in sentences(text) {
        let len = sentence.chars().count();
        let joined_len = if current.is_empty() { len } else { current_len + 1 + len };

        if joined_len <= max_len {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            current_len = joined_len;
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(sentence);
            current_len = len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    tracing::debug!(chunks = chunks.len(), max_len, "text chunked");
    chunks
}

/// Sentences in order, terminal punctuation kept, separating whitespace dropped.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        // terminal punctuation is a single ASCII byte
        let end = m.start() + 1;
        if end > start {
            out.push(&text[start..end]);
        }
        start = m.end();
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}
