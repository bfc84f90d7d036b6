//! Continuation Controller
//!
//! Drives the exchange for one chunk: `Initial -> Continuing* -> Done | Failed`.
//! A cut-short reply is resumed with follow-up requests until it terminates, the
//! backend says it stopped, an `error` block appears, or the continuation budget runs
//! out. Every continuation re-parses the whole accumulated reply from scratch.

use crate::chunker::Chunk;
use crate::error::TulpError;
use crate::inspect::Inspector;
use crate::parser::{parse, ParsedBlocks};
use crate::prompt::{continuation_message, PromptFactory};
use crate::protocol::{BlockName, LineKind, TagGrammar};
use crate::provider::{FinishReason, LlmClient, Message, RawReply};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a chunk's exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Reply closed with the reply-end marker.
    Complete,
    /// Backend reported `stop` but the reply never closed.
    Unterminated,
    /// Cut short by the token limit and the continuation budget could not finish it.
    Truncated,
    /// No reply-start marker at all.
    Malformed,
}

/// Result of processing one chunk.
#[derive(Debug, Clone)]
pub struct ChunkReply {
    pub blocks: ParsedBlocks,
    pub reply_text: String,
    pub finish_reason: FinishReason,
    /// Backend calls made for this chunk, initial call included.
    pub calls: u32,
    pub outcome: ChunkOutcome,
}

impl ChunkReply {
    pub fn stdout(&self) -> &str {
        self.blocks.content(BlockName::Stdout)
    }

    pub fn commentary(&self) -> &str {
        self.blocks.content(BlockName::Stderr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initial,
    Continuing,
    Done,
}

pub struct ContinuationController {
    client: Arc<dyn LlmClient>,
    grammar: TagGrammar,
    budget: u32,
    inspector: Option<Arc<Inspector>>,
}

impl ContinuationController {
    pub fn new(client: Arc<dyn LlmClient>, grammar: TagGrammar, budget: u32) -> Self {
        Self {
            client,
            grammar,
            budget,
            inspector: None,
        }
    }

    pub fn with_inspector(mut self, inspector: Option<Arc<Inspector>>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Process one chunk of input (or the bare request when there is no input).
    pub async fn process(
        &self,
        factory: &dyn PromptFactory,
        request: &str,
        chunk: &Chunk,
    ) -> Result<ChunkReply, TulpError> {
        let messages = factory.messages(request, &chunk.text, chunk.total, chunk.index);
        self.run(messages, chunk).await
    }

    /// Run the state machine starting from an already built request.
    pub async fn run(
        &self,
        mut messages: Vec<Message>,
        chunk: &Chunk,
    ) -> Result<ChunkReply, TulpError> {
        let label = chunk.label();
        let mut remaining = self.budget;
        let mut calls: u32 = 0;
        let mut reply_text = String::new();
        let mut last_reply: Option<RawReply> = None;
        let mut finish_reason = FinishReason::Other("none".to_string());
        let mut blocks = ParsedBlocks::default();
        let mut phase = Phase::Initial;

        loop {
            match phase {
                Phase::Initial => {
                    debug!(chunk = %label, "Sending initial request");
                    let reply = self.call(&messages, chunk, calls).await?;
                    calls += 1;
                    reply_text.push_str(&reply.content);
                    finish_reason = reply.finish_reason.clone();
                    blocks = parse(&reply_text, &self.grammar);
                    last_reply = Some(reply);
                }
                Phase::Continuing => {
                    remaining -= 1;
                    info!(
                        chunk = %label,
                        attempt = calls,
                        budget = self.budget,
                        "Reply is incomplete; requesting continuation"
                    );
                    if let Some(previous) = last_reply.take() {
                        messages.push(previous.to_message());
                    }
                    messages.push(continuation_message(&self.grammar, &label));

                    let reply = self.call(&messages, chunk, calls).await?;
                    calls += 1;
                    let piece =
                        strip_resumed_markers(&reply.content, blocks.open_block(), &self.grammar);
                    finish_reason = reply.finish_reason.clone();
                    if piece.trim().is_empty() {
                        warn!(chunk = %label, "Continuation request returned empty content");
                        phase = Phase::Done;
                        continue;
                    }
                    reply_text.push('\n');
                    reply_text.push_str(&piece);
                    blocks = parse(&reply_text, &self.grammar);
                    last_reply = Some(reply);
                }
                Phase::Done => break,
            }

            // An error block only fails the chunk when it says something
            if blocks.is_nonempty(BlockName::Error) {
                return Err(TulpError::BackendDeclared(
                    blocks.content(BlockName::Error).to_string(),
                ));
            }

            phase = if needs_continuation(&blocks, &finish_reason, remaining) {
                Phase::Continuing
            } else {
                Phase::Done
            };
        }

        let outcome = classify(&blocks, &finish_reason);
        match outcome {
            ChunkOutcome::Complete => {
                debug!(chunk = %label, calls, "Reply complete")
            }
            ChunkOutcome::Unterminated => warn!(
                chunk = %label,
                finish_reason = finish_reason.as_str(),
                "Reply ended without the reply-end marker; output may be incomplete"
            ),
            ChunkOutcome::Truncated => warn!(
                chunk = %label,
                continuation_retries = self.budget,
                "Reply was cut short by the backend's token limit and is incomplete. \
                 Raise the continuation budget with --cont N (or TULP_CONT), or lower \
                 --max-chars to send smaller chunks"
            ),
            ChunkOutcome::Malformed => warn!(
                chunk = %label,
                "Reply does not follow the block grammar (no reply-start marker)"
            ),
        }
        if !blocks.exists(BlockName::Stdout) && outcome != ChunkOutcome::Malformed {
            warn!(chunk = %label, "No stdout block found in reply");
        }

        Ok(ChunkReply {
            blocks,
            reply_text,
            finish_reason,
            calls,
            outcome,
        })
    }

    async fn call(
        &self,
        messages: &[Message],
        chunk: &Chunk,
        attempt: u32,
    ) -> Result<RawReply, TulpError> {
        let reply = self.client.generate(messages).await?;
        if let Some(inspector) = &self.inspector {
            inspector.record(
                &format!("chunk_{}_attempt_{}", chunk.index, attempt),
                messages,
                &reply,
            );
        }
        if reply.is_error() {
            return Err(reply.into_error());
        }
        Ok(reply)
    }
}

/// Continue iff budget remains, the reply is unterminated, carries no error block and
/// the backend did not report a terminal finish reason.
fn needs_continuation(blocks: &ParsedBlocks, finish_reason: &FinishReason, remaining: u32) -> bool {
    remaining > 0
        && !blocks.terminated_correctly()
        && !blocks.exists(BlockName::Error)
        && !finish_reason.is_terminal()
}

fn classify(blocks: &ParsedBlocks, finish_reason: &FinishReason) -> ChunkOutcome {
    if !blocks.has_structure() {
        ChunkOutcome::Malformed
    } else if blocks.terminated_correctly() {
        ChunkOutcome::Complete
    } else if *finish_reason == FinishReason::Stop {
        ChunkOutcome::Unterminated
    } else {
        ChunkOutcome::Truncated
    }
}

/// Drop markers a backend repeats when resuming: a leading reply-start line and a
/// block-start line reopening the block that was still open.
fn strip_resumed_markers(
    content: &str,
    open_block: Option<BlockName>,
    grammar: &TagGrammar,
) -> String {
    let mut lines: Vec<&str> = content.split('\n').collect();
    while lines.first().is_some_and(|l| l.trim().is_empty()) && lines.len() > 1 {
        lines.remove(0);
    }
    if lines
        .first()
        .is_some_and(|l| grammar.classify(l.trim_end()) == LineKind::ReplyStart)
    {
        debug!("Dropping repeated reply-start marker from continuation");
        lines.remove(0);
    }
    if let (Some(open), Some(first)) = (open_block, lines.first()) {
        if grammar.classify(first.trim_end()) == LineKind::BlockStart(open) {
            debug!(block = %open, "Dropping repeated block-start marker from continuation");
            lines.remove(0);
        }
    }
    lines.join("\n")
}
