use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

pub const ELLIPSIS: &str = "...";

// A terminator only ends a sentence when whitespace or the end of text follows,
// so "1.2" and "gov.uk" stay whole.
static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(.*?)([.!?]+)(?:\s+|\z)").expect("valid sentence regex"));

/// Caps `text` at `max_words` words. Overlong text keeps its first
/// `max_words` words and gets an ellipsis glued to the last one.
pub fn clamp_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.trim().to_string();
    }
    warn!(
        "Narration has {} words; truncating to {}",
        words.len(),
        max_words
    );
    let mut clamped = words[..max_words].join(" ");
    clamped.push_str(ELLIPSIS);
    clamped
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Splits narration into caption fragments on sentence-terminal punctuation.
/// Empty fragments are dropped. A fragment keeps its own terminator, or gets
/// a period when it had none.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut consumed = 0;
    for cap in SENTENCE_RE.captures_iter(text) {
        let body = cap.get(1).map_or("", |m| m.as_str());
        let terminator = cap.get(2).map_or("", |m| m.as_str());
        push_sentence(&mut sentences, body, terminator);
        consumed = cap.get(0).map_or(consumed, |m| m.end());
    }
    push_sentence(&mut sentences, &text[consumed..], ".");
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, body: &str, terminator: &str) {
    let words: Vec<&str> = body.split_whitespace().collect();
    // punctuation-only runs such as " ... " carry no words
    if words.iter().all(|w| w.chars().all(|c| matches!(c, '.' | '!' | '?'))) {
        return;
    }
    sentences.push(format!("{}{}", words.join(" "), terminator));
}

/// Greedy word wrap into lines of at most `width` characters. A single word
/// longer than `width` gets a line of its own.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        match lines.last_mut() {
            Some(line) if line.chars().count() + 1 + word.chars().count() <= width => {
                line.push(' ');
                line.push_str(word);
            }
            _ => lines.push(word.to_string()),
        }
    }
    lines
}
