//! Chunk size and reconstruction invariants

use proptest::prelude::*;
use tulp::chunker::chunk;

fn lines_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z0-9 ,.é]{1,40}", 1..40)
}

/// Like `lines_strategy`, with blank lines mixed in.
fn lines_with_blanks_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop_oneof![3 => "[a-zA-Z0-9 ,.é]{1,40}", 1 => Just(String::new())], 1..40)
}

fn non_blank_lines(text: &str) -> Vec<&str> {
    text.split('\n').filter(|line| !line.is_empty()).collect()
}

proptest! {
    #[test]
    fn test_every_chunk_respects_the_limit(
        lines in lines_strategy(),
        long_line in "[x]{0,300}",
        max_chars in 1usize..120,
    ) {
        let mut lines = lines;
        lines.push(long_line);
        let text = lines.join("\n");
        let chunks = chunk(&text, max_chars);

        for piece in &chunks {
            prop_assert!(piece.text.chars().count() <= max_chars);
            prop_assert!(!piece.text.is_empty());
        }
    }

    #[test]
    fn test_chunks_are_never_empty(lines in lines_with_blanks_strategy(), max_chars in 1usize..120) {
        let text = lines.join("\n");
        for piece in chunk(&text, max_chars) {
            prop_assert!(!piece.text.is_empty());
            prop_assert!(piece.text.chars().count() <= max_chars);
        }
    }

    #[test]
    fn test_blank_lines_only_vanish_at_chunk_boundaries(
        lines in lines_with_blanks_strategy(),
        max_chars in 40usize..200,
    ) {
        let text = lines.join("\n");
        let rejoined = chunk(&text, max_chars)
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("\n");
        // Content lines all survive, in order
        prop_assert_eq!(non_blank_lines(&rejoined), non_blank_lines(&text));
        if text.chars().count() <= max_chars {
            prop_assert_eq!(rejoined, text);
        }
    }

    #[test]
    fn test_chunks_are_numbered_in_order(lines in lines_with_blanks_strategy(), max_chars in 1usize..120) {
        let text = lines.join("\n");
        let chunks = chunk(&text, max_chars);
        let total = chunks.len();
        for (i, piece) in chunks.iter().enumerate() {
            prop_assert_eq!(piece.index, i + 1);
            prop_assert_eq!(piece.total, total);
        }
    }

    #[test]
    fn test_chunks_rejoin_to_the_input(lines in lines_strategy(), max_chars in 40usize..200) {
        // No line exceeds the limit, so no hard split happens
        let text = lines.join("\n");
        let rejoined = chunk(&text, max_chars)
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("\n");
        prop_assert_eq!(rejoined, text);
    }
}
