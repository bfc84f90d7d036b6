//! Reply grammar vocabulary.
//!
//! A reply is a run of lines wrapped in a reply-start and a reply-end marker. Inside,
//! named blocks open with a block-start marker and close with the shared block-end
//! marker. The lexical form of every marker lives in [`TagGrammar`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed vocabulary of block names a reply may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockName {
    Stdout,
    Stderr,
    Error,
    Context,
    Thoughts,
    InnerMessage,
}

impl BlockName {
    pub const ALL: [BlockName; 6] = [
        BlockName::Stdout,
        BlockName::Stderr,
        BlockName::Error,
        BlockName::Context,
        BlockName::Thoughts,
        BlockName::InnerMessage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockName::Stdout => "stdout",
            BlockName::Stderr => "stderr",
            BlockName::Error => "error",
            BlockName::Context => "context",
            BlockName::Thoughts => "thoughts",
            BlockName::InnerMessage => "inner_message",
        }
    }
}

impl fmt::Display for BlockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown block name: {}", s))
    }
}

/// Lexical form of the reply markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagGrammar {
    pub reply_start: String,
    pub reply_end: String,
    pub block_start_prefix: String,
    pub block_start_suffix: String,
    pub block_end: String,
    /// Delimiters wrapping piped input inside a prompt; never expected in replies
    pub input_start: String,
    pub input_end: String,
}

/// Classification of a single reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    ReplyStart,
    ReplyEnd,
    BlockStart(BlockName),
    UnknownBlock(&'a str),
    BlockEnd,
    Content,
}

impl TagGrammar {
    /// `<|||reply_start|||>` / `<|||dev_file_start=NAME|||>` markers.
    pub fn verbose() -> Self {
        Self {
            reply_start: "<|||reply_start|||>".to_string(),
            reply_end: "<|||reply_end|||>".to_string(),
            block_start_prefix: "<|||dev_file_start=".to_string(),
            block_start_suffix: "|||>".to_string(),
            block_end: "<|||dev_file_end|||>".to_string(),
            input_start: "<|||stdin_prompt_start|||>".to_string(),
            input_end: "<|||stdin_prompt_end|||>".to_string(),
        }
    }

    /// `(#reply_start)` / `(#NAME)` markers.
    pub fn terse() -> Self {
        Self {
            reply_start: "(#reply_start)".to_string(),
            reply_end: "(#reply_end)".to_string(),
            block_start_prefix: "(#".to_string(),
            block_start_suffix: ")".to_string(),
            block_end: "(#end)".to_string(),
            input_start: "(#stdin_start)".to_string(),
            input_end: "(#stdin_end)".to_string(),
        }
    }

    /// Look up a preset by its configuration name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "verbose" => Some(Self::verbose()),
            "terse" => Some(Self::terse()),
            _ => None,
        }
    }

    pub fn block_start(&self, name: BlockName) -> String {
        format!(
            "{}{}{}",
            self.block_start_prefix,
            name.as_str(),
            self.block_start_suffix
        )
    }

    /// Classify one line. Markers must match the whole line.
    ///
    /// Exact markers are checked before the block-start pattern because the terse
    /// preset's reply and end markers also fit `(#...)`.
    pub fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        if line == self.reply_start {
            return LineKind::ReplyStart;
        }
        if line == self.reply_end {
            return LineKind::ReplyEnd;
        }
        if line == self.block_end {
            return LineKind::BlockEnd;
        }
        let Some(raw) = line
            .strip_prefix(self.block_start_prefix.as_str())
            .and_then(|rest| rest.strip_suffix(self.block_start_suffix.as_str()))
        else {
            return LineKind::Content;
        };
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return LineKind::Content;
        }
        match raw.parse::<BlockName>() {
            Ok(name) => LineKind::BlockStart(name),
            Err(_) => LineKind::UnknownBlock(raw),
        }
    }
}

impl Default for TagGrammar {
    fn default() -> Self {
        Self::verbose()
    }
}
