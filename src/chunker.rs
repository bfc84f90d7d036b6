//! Input Chunker
//!
//! Splits piped input into ordered pieces of at most `max_chars` characters, cutting on
//! line boundaries. A line longer than the limit is hard-split into slices of exactly
//! `max_chars` characters (the last slice may be shorter). Lengths are counted in
//! characters, never bytes, so multi-byte text is never cut mid-codepoint.

use serde::Serialize;
use tracing::{debug, info, warn};

/// One ordered piece of input. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub total: usize,
    pub text: String,
}

impl Chunk {
    pub fn is_last(&self) -> bool {
        self.index == self.total
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.index, self.total)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` into chunks. Empty input yields no chunks.
pub fn chunk(text: &str, max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    if text.is_empty() {
        return Vec::new();
    }

    let total_chars = char_len(text);
    if total_chars <= max_chars {
        debug!(chars = total_chars, max_chars, "Input fits in a single chunk");
        return number(vec![text.to_string()]);
    }

    warn!(
        "Input is large ({} characters) and will be processed in chunks of at most {} characters. \
         Line-oriented tasks usually work well; tasks that need the whole document at once \
         (such as summarization) may degrade. Raise --max-chars or TULP_MAX_CHARS, or use a \
         model with a larger context window, to avoid chunking.",
        total_chars, max_chars
    );

    let mut pieces: Vec<String> = Vec::new();
    let mut current: Option<(String, usize)> = None;

    for line in text.split('\n') {
        let line_len = char_len(line);

        if let Some((buf, len)) = current.as_mut() {
            if *len + 1 + line_len <= max_chars {
                buf.push('\n');
                buf.push_str(line);
                *len += 1 + line_len;
                continue;
            }
        }

        if let Some((buf, _)) = current.take() {
            pieces.push(buf);
        }

        if line_len <= max_chars {
            current = Some((line.to_string(), line_len));
        } else {
            warn!(
                line_chars = line_len,
                max_chars, "A single line exceeds the chunk limit and will be split"
            );
            let chars: Vec<char> = line.chars().collect();
            pieces.extend(chars.chunks(max_chars).map(|slice| slice.iter().collect::<String>()));
        }
    }

    if let Some((buf, _)) = current {
        pieces.push(buf);
    }

    // A blank line left alone at a boundary has nothing to send
    pieces.retain(|piece| !piece.is_empty());
    let chunks = number(pieces);
    info!(chunks = chunks.len(), "Input split into chunks");
    for c in &chunks {
        debug!(chunk = %c.label(), chars = char_len(&c.text), "Chunk size");
    }
    chunks
}

fn number(pieces: Vec<String>) -> Vec<Chunk> {
    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            index: i + 1,
            total,
            text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_small_input_is_single_chunk() {
        let chunks = chunk("a\nb\nc\n", 100);
        assert_eq!(texts(&chunks), vec!["a\nb\nc\n"]);
        assert_eq!(chunks[0].index, 1);
        assert_eq!(chunks[0].total, 1);
        assert!(chunks[0].is_last());
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(chunk("", 10).is_empty());
    }

    #[test]
    fn test_three_long_lines_each_get_a_chunk() {
        let line = "x".repeat(60);
        let text = format!("{}\n{}\n{}", line, line, line);
        let chunks = chunk(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.text == line));
        assert_eq!(chunks[2].label(), "3/3");
    }

    #[test]
    fn test_lines_are_packed_until_limit() {
        let chunks = chunk("aaaa\nbbbb\ncccc\ndddd", 9);
        assert_eq!(texts(&chunks), vec!["aaaa\nbbbb", "cccc\ndddd"]);
    }

    #[test]
    fn test_long_line_is_hard_split() {
        let text = format!("short\n{}\ntail", "y".repeat(25));
        let chunks = chunk(&text, 10);
        assert_eq!(
            texts(&chunks),
            vec!["short", "yyyyyyyyyy", "yyyyyyyyyy", "yyyyy", "tail"]
        );
    }

    #[test]
    fn test_first_line_longer_than_limit_is_split() {
        let chunks = chunk(&"z".repeat(21), 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].text, "z");
    }

    #[test]
    fn test_multibyte_characters_are_counted_as_chars() {
        let text = "ñññ\nñññ";
        assert_eq!(chunk(text, 7).len(), 1);
        let chunks = chunk(text, 3);
        assert_eq!(texts(&chunks), vec!["ñññ", "ñññ"]);
    }

    #[test]
    fn test_blank_line_alone_at_a_boundary_is_dropped() {
        let chunks = chunk("aaaa\n\nbbbb", 4);
        assert_eq!(texts(&chunks), vec!["aaaa", "bbbb"]);
        assert_eq!(chunks[1].label(), "2/2");

        // Blank lines that fit inside a chunk are kept
        let chunks = chunk("aa\n\nbb\ncccc", 6);
        assert_eq!(texts(&chunks), vec!["aa\n\nbb", "cccc"]);
    }

    #[test]
    fn test_trailing_newline_is_preserved() {
        let chunks = chunk("aaaa\nbbbb\n", 6);
        assert_eq!(texts(&chunks), vec!["aaaa", "bbbb\n"]);
        let joined: Vec<&str> = texts(&chunks);
        assert_eq!(joined.join("\n"), "aaaa\nbbbb\n");
    }
}
