//! Response Parser
//!
//! Line-oriented finite-state parser for tagged replies. Parsing never fails: a reply
//! without structure yields an empty [`ParsedBlocks`] whose termination flag is false,
//! and every protocol irregularity is recorded as a warning instead of an error.

use crate::protocol::{BlockName, LineKind, TagGrammar};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Blocks extracted from one (possibly multi-turn) reply text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBlocks {
    blocks: BTreeMap<BlockName, String>,
    opened: bool,
    terminated: bool,
    open_block: Option<BlockName>,
    warnings: Vec<String>,
}

impl ParsedBlocks {
    pub fn exists(&self, name: BlockName) -> bool {
        self.blocks.contains_key(&name)
    }

    pub fn is_nonempty(&self, name: BlockName) -> bool {
        self.blocks.get(&name).is_some_and(|c| !c.is_empty())
    }

    /// Trimmed block content; empty when the block is absent.
    pub fn content(&self, name: BlockName) -> &str {
        self.blocks.get(&name).map(String::as_str).unwrap_or("")
    }

    /// True iff the reply opened correctly and its final line is the reply-end marker.
    pub fn terminated_correctly(&self) -> bool {
        self.terminated
    }

    /// Block that was still open when the input ran out.
    pub fn open_block(&self) -> Option<BlockName> {
        self.open_block
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn block_names(&self) -> impl Iterator<Item = BlockName> + '_ {
        self.blocks.keys().copied()
    }

    /// False when the reply did not even begin with the reply-start marker.
    pub fn has_structure(&self) -> bool {
        self.opened
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OutsideReply,
    OutsideBlock,
    InBlock(BlockName),
    /// Inside a block whose name is not in the vocabulary.
    SkippingBlock,
}

struct BlockParser<'g> {
    grammar: &'g TagGrammar,
    state: State,
    buffer: Vec<String>,
    out: ParsedBlocks,
}

impl<'g> BlockParser<'g> {
    fn new(grammar: &'g TagGrammar) -> Self {
        Self {
            grammar,
            state: State::OutsideBlock,
            buffer: Vec::new(),
            out: ParsedBlocks::default(),
        }
    }

    fn record(&mut self, message: String) {
        warn!(target: "tulp::parser", "{}", message);
        self.out.warnings.push(message);
    }

    fn commit(&mut self, name: BlockName) {
        let content = self.buffer.join("\n").trim().to_string();
        self.buffer.clear();
        match self.out.blocks.get_mut(&name) {
            Some(existing) if !content.is_empty() => {
                if !existing.is_empty() {
                    existing.push('\n');
                }
                existing.push_str(&content);
            }
            Some(_) => {}
            None => {
                debug!(block = %name, chars = content.len(), "Parsed block");
                self.out.blocks.insert(name, content);
            }
        }
    }

    fn feed(&mut self, line: &str) {
        let kind = self.grammar.classify(line);
        self.state = match (self.state, kind) {
            (State::InBlock(name), LineKind::Content) => {
                self.buffer.push(line.to_string());
                State::InBlock(name)
            }
            (State::InBlock(name), LineKind::BlockEnd) => {
                self.commit(name);
                State::OutsideBlock
            }
            (State::InBlock(name), LineKind::BlockStart(next)) => {
                self.record(format!(
                    "Block '{}' reopened as '{}' before its end marker; keeping partial content",
                    name, next
                ));
                self.commit(name);
                State::InBlock(next)
            }
            (State::InBlock(name), LineKind::UnknownBlock(raw)) => {
                self.record(format!(
                    "Block '{}' interrupted by unknown block '{}'; keeping partial content",
                    name, raw
                ));
                self.commit(name);
                State::SkippingBlock
            }
            (State::InBlock(name), LineKind::ReplyEnd) => {
                self.commit(name);
                State::OutsideReply
            }
            (State::InBlock(name), LineKind::ReplyStart) => {
                self.record("Repeated reply start marker inside a block ignored".to_string());
                State::InBlock(name)
            }

            (State::OutsideReply, LineKind::BlockStart(name)) => {
                self.record(format!("Block '{}' found after reply end marker", name));
                State::InBlock(name)
            }
            (State::OutsideReply, LineKind::ReplyStart) => State::OutsideBlock,
            (State::OutsideReply, _) => {
                debug!(line, "Discarding line after reply end marker");
                State::OutsideReply
            }

            (_, LineKind::BlockStart(name)) => State::InBlock(name),
            (_, LineKind::UnknownBlock(raw)) => {
                self.record(format!("Ignoring block with unrecognized name '{}'", raw));
                State::SkippingBlock
            }
            (_, LineKind::BlockEnd) => {
                if self.state == State::OutsideBlock {
                    self.record("Block end marker without an open block ignored".to_string());
                }
                State::OutsideBlock
            }
            (_, LineKind::ReplyEnd) => State::OutsideReply,
            (State::SkippingBlock, _) => State::SkippingBlock,
            (State::OutsideBlock, LineKind::ReplyStart) => {
                self.record("Repeated reply start marker ignored".to_string());
                State::OutsideBlock
            }
            (State::OutsideBlock, LineKind::Content) => {
                if !line.trim().is_empty() {
                    debug!(line, "Discarding content outside any block");
                }
                State::OutsideBlock
            }
        };
    }

    fn finish(mut self, terminated: bool) -> ParsedBlocks {
        if let State::InBlock(name) = self.state {
            self.record(format!(
                "Reply ended while block '{}' was still open; keeping partial content",
                name
            ));
            self.commit(name);
            self.out.open_block = Some(name);
        }
        self.out.opened = true;
        self.out.terminated = terminated;
        self.out
    }
}

/// Parse a reply into its blocks.
pub fn parse(reply_text: &str, grammar: &TagGrammar) -> ParsedBlocks {
    let lines: Vec<&str> = reply_text.trim().lines().collect();

    if lines.first().map(|l| grammar.classify(l)) != Some(LineKind::ReplyStart) {
        let mut out = ParsedBlocks::default();
        let message = format!("Reply is missing the start marker '{}'", grammar.reply_start);
        warn!(target: "tulp::parser", "{}", message);
        out.warnings.push(message);
        return out;
    }

    let terminated =
        lines.len() > 1 && lines.last().map(|l| grammar.classify(l)) == Some(LineKind::ReplyEnd);

    let mut parser = BlockParser::new(grammar);
    for line in &lines[1..] {
        parser.feed(line);
    }
    if !terminated {
        parser.record(format!(
            "Reply end marker '{}' missing or not on the final line",
            grammar.reply_end
        ));
    }
    parser.finish(terminated)
}
