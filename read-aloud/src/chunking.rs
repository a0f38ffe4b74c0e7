//! Sentence chunking for engines that drop long utterances.
//!
//! Text longer than [`CHUNK_THRESHOLD_CHARS`] characters is split into
//! sentences. A sentence ends after a run of `.`, `!` or `?` that is
//! followed by whitespace or the end of the text; the whitespace is dropped.
//! Text with no terminator at all stays a single chunk.

/// Character count above which text is spoken sentence by sentence.
pub const CHUNK_THRESHOLD_CHARS: usize = 200;

/// Number of sentences read from a longer document by default.
pub const DEFAULT_MAX_SENTENCES: usize = 100;

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Whether `text` is long enough to be chunked.
///
/// Counts characters, not bytes.
pub fn needs_chunking(text: &str) -> bool {
    text.chars().count() > CHUNK_THRESHOLD_CHARS
}

/// Split text into trimmed, non-empty sentences.
///
/// ## Examples
///
/// ```
/// use read_aloud::chunking::split_sentences;
///
/// assert_eq!(
///     split_sentences("One. Two?! Three"),
///     vec!["One.", "Two?!", "Three"]
/// );
/// assert_eq!(split_sentences("v1.2 is out"), vec!["v1.2 is out"]);
/// ```
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }

        // Consume the whole terminator run ("?!", "...")
        while let Some(&(_, next)) = chars.peek() {
            if !is_terminator(next) {
                break;
            }
            chars.next();
        }

        let end = chars.peek().map_or(text.len(), |&(i, _)| i);
        let at_boundary = chars.peek().is_none_or(|&(_, next)| next.is_whitespace());
        if at_boundary {
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
    }

    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, segment: &str) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

/// The utterance texts for `text`: sentences when `chunked` and the text is
/// over the threshold, otherwise the whole trimmed text.
///
/// Empty or whitespace-only text yields no chunks.
pub fn plan_chunks(text: &str, chunked: bool) -> Vec<String> {
    if chunked && needs_chunking(text) {
        return split_sentences(text);
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![trimmed.to_string()]
    }
}

/// Keep at most `max_sentences` sentences of `text`, joined by single spaces.
///
/// Used to cap how much of a long document is read aloud.
pub fn truncate_to_sentences(text: &str, max_sentences: usize) -> String {
    split_sentences(text)
        .into_iter()
        .take(max_sentences)
        .collect::<Vec<_>>()
        .join(" ")
}
