use crate::error::Result;
use crate::mode::keys;
use crate::models::Produced;
use crate::provider::{Input, Provider};
use crate::providers::TEXT_MEDIA_TYPES;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use tracing::instrument;

const TOP_WORDS: usize = 10;

/// Plain statistics over UTF-8 text. Invalid sequences are replaced, never
/// rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextStats;

impl TextStats {
    pub fn new() -> Self {
        Self
    }
}

/// Number of lines, counting a trailing unterminated line.
fn line_count(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    let newlines = memchr::memchr_iter(b'\n', text.as_bytes()).count() as u64;
    if text.ends_with('\n') { newlines } else { newlines + 1 }
}

/// Runs of `.`, `!` or `?` followed by whitespace or the end of the text.
/// Text with words but no terminator counts as one sentence.
fn sentence_count(text: &str) -> u64 {
    let mut count = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            while chars.next_if(|c| matches!(c, '.' | '!' | '?')).is_some() {}
            if chars.peek().is_none_or(|c| c.is_whitespace()) {
                count += 1;
            }
        }
    }
    if count == 0 && text.split_whitespace().next().is_some() { 1 } else { count }
}

fn top_words(text: &str) -> serde_json::Value {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for word in text.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        if !word.is_empty() {
            *counts.entry(word).or_default() += 1;
        }
    }
    let mut counts = counts.into_iter().collect::<Vec<_>>();
    counts.sort_by(|(a_word, a), (b_word, b)| b.cmp(a).then_with(|| a_word.cmp(b_word)));
    counts
        .into_iter()
        .take(TOP_WORDS)
        .map(|(word, count)| json!({ "word": word, "count": count }))
        .collect()
}

#[async_trait]
impl Provider for TextStats {
    fn name(&self) -> &str {
        "text-stats"
    }

    fn media_types(&self) -> &[&str] {
        TEXT_MEDIA_TYPES
    }

    fn keys(&self) -> &[&str] {
        &[
            keys::TEXT_CONTENT,
            keys::TEXT_WORD_COUNT,
            keys::TEXT_LINE_COUNT,
            keys::TEXT_CHAR_COUNT,
            keys::TEXT_SENTENCE_COUNT,
            keys::TEXT_TOP_WORDS,
        ]
    }

    fn priority(&self) -> i32 {
        100
    }

    #[instrument(level = "trace", skip_all, fields(size = input.bytes.len()))]
    async fn extract(&self, input: &Input) -> Result<Vec<Produced>> {
        let text = input.text();
        let mut produced = Vec::new();
        if input.wants(keys::TEXT_WORD_COUNT) {
            produced.push(Produced::new(keys::TEXT_WORD_COUNT, text.split_whitespace().count() as u64));
        }
        if input.wants(keys::TEXT_LINE_COUNT) {
            produced.push(Produced::new(keys::TEXT_LINE_COUNT, line_count(&text)));
        }
        if input.wants(keys::TEXT_CHAR_COUNT) {
            produced.push(Produced::new(keys::TEXT_CHAR_COUNT, text.chars().count() as u64));
        }
        if input.wants(keys::TEXT_SENTENCE_COUNT) {
            produced.push(Produced::new(keys::TEXT_SENTENCE_COUNT, sentence_count(&text)));
        }
        if input.wants(keys::TEXT_TOP_WORDS) {
            produced.push(Produced::new(keys::TEXT_TOP_WORDS, top_words(&text)));
        }
        if input.wants(keys::TEXT_CONTENT) {
            produced.push(Produced::new(keys::TEXT_CONTENT, text));
        }
        Ok(produced)
    }
}
