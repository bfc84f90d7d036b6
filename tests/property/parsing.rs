//! Parsing is a pure function of the reply text

use proptest::prelude::*;
use tulp::parser::parse;
use tulp::protocol::{BlockName, TagGrammar};

proptest! {
    #[test]
    fn test_reparsing_is_idempotent(
        stdout in "[a-zA-Z0-9 ,.;:=|-]{0,60}(\n[a-zA-Z0-9 ,.;:=|-]{0,60}){0,5}",
        stderr in "[a-zA-Z0-9 ,.;:=|-]{0,60}",
        terse in any::<bool>(),
    ) {
        let grammar = if terse { TagGrammar::terse() } else { TagGrammar::verbose() };
        let reply = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}",
            grammar.reply_start,
            grammar.block_start(BlockName::Stdout),
            stdout,
            grammar.block_end,
            grammar.block_start(BlockName::Stderr),
            stderr,
            grammar.block_end,
            grammar.reply_end,
        );

        let first = parse(&reply, &grammar);
        let second = parse(&reply, &grammar);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.terminated_correctly());
        prop_assert_eq!(first.content(BlockName::Stdout), stdout.trim());
        prop_assert_eq!(first.content(BlockName::Stderr), stderr.trim());
    }

    #[test]
    fn test_parsing_arbitrary_text_never_panics(text in "\\PC{0,200}") {
        let blocks = parse(&text, &TagGrammar::verbose());
        let _ = blocks.terminated_correctly();
    }
}
