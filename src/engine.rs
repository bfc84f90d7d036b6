//! Top-level run loop.
//!
//! Chunks the input, sends each chunk through the continuation controller in order (or
//! hands the whole run to the execution controller), and aggregates the result into a
//! [`RunReport`]. Nothing here writes to stdout or exits the process.

use crate::chunker::{chunk, Chunk};
use crate::config::TulpConfig;
use crate::continuation::{ChunkOutcome, ContinuationController};
use crate::error::TulpError;
use crate::execution::{ExecutionController, ProgramRunner};
use crate::exit_codes;
use crate::inspect::Inspector;
use crate::output::{aggregate, clean};
use crate::prompt::PromptMode;
use crate::protocol::TagGrammar;
use crate::provider::LlmClient;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Settings the engine reads from the configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_chars: usize,
    pub continuation_retries: u32,
    pub max_execution_retries: u32,
    pub execute: bool,
    pub grammar: TagGrammar,
    /// Interpreter generated programs are written for.
    pub interpreter: String,
}

impl EngineSettings {
    pub fn from_config(config: &TulpConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            continuation_retries: config.continuation_retries,
            max_execution_retries: config.max_execution_retries,
            execute: config.execute,
            grammar: config.tag_grammar(),
            interpreter: config.interpreter.clone(),
        }
    }
}

/// How a run ended, short of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// A reply stopped without its end marker; output is emitted with a warning.
    Unterminated,
    /// Token limit hit and the continuation budget could not finish the reply.
    Truncated,
    /// A reply did not follow the block grammar at all.
    Malformed,
    /// The generated program still failed after every repair attempt.
    ExecutionFailed,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success | RunStatus::Unterminated => exit_codes::SUCCESS,
            RunStatus::Truncated | RunStatus::Malformed => exit_codes::PROTOCOL_ERROR,
            RunStatus::ExecutionFailed => exit_codes::BACKEND_ERROR,
        }
    }

    fn severity(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Unterminated => 1,
            RunStatus::ExecutionFailed => 2,
            RunStatus::Truncated => 3,
            RunStatus::Malformed => 4,
        }
    }

    fn worst(self, other: RunStatus) -> RunStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl From<ChunkOutcome> for RunStatus {
    fn from(outcome: ChunkOutcome) -> Self {
        match outcome {
            ChunkOutcome::Complete => RunStatus::Success,
            ChunkOutcome::Unterminated => RunStatus::Unterminated,
            ChunkOutcome::Truncated => RunStatus::Truncated,
            ChunkOutcome::Malformed => RunStatus::Malformed,
        }
    }
}

/// Everything the caller needs to finish a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Final text for the output sink.
    pub output: String,
    /// `stderr` block of the final chunk.
    pub commentary: String,
    pub status: RunStatus,
    /// Program that produced `output`, in execution mode.
    pub generated_program: Option<String>,
    /// User-facing explanation when `status` is not a success.
    pub diagnostic: Option<String>,
    /// Backend calls made over the whole run.
    pub calls: u32,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

pub struct Engine {
    settings: EngineSettings,
    client: Arc<dyn LlmClient>,
    runner: Arc<dyn ProgramRunner>,
    inspector: Option<Arc<Inspector>>,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        client: Arc<dyn LlmClient>,
        runner: Arc<dyn ProgramRunner>,
    ) -> Self {
        Self {
            settings,
            client,
            runner,
            inspector: None,
        }
    }

    pub fn with_inspector(mut self, inspector: Option<Arc<Inspector>>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Run one request against the (already trimmed) input.
    pub async fn run(&self, request: &str, input: &str) -> Result<RunReport, TulpError> {
        debug!(
            provider = self.client.provider_name(),
            model = self.client.model_name(),
            execute = self.settings.execute,
            input_chars = input.chars().count(),
            "Starting run"
        );
        let mode = PromptMode::select(self.settings.execute, !input.is_empty());
        let mut chunks = chunk(input, self.settings.max_chars);
        if chunks.is_empty() {
            chunks.push(Chunk {
                index: 1,
                total: 1,
                text: String::new(),
            });
        }

        if mode.is_execution() {
            self.run_execution(mode, request, &chunks[0], input).await
        } else {
            self.run_chunks(mode, request, &chunks).await
        }
    }

    async fn run_chunks(
        &self,
        mode: PromptMode,
        request: &str,
        chunks: &[Chunk],
    ) -> Result<RunReport, TulpError> {
        let factory = mode.factory(&self.settings.grammar, &self.settings.interpreter);
        debug!(prompt = factory.name(), chunks = chunks.len(), "Prompt selected");
        let controller = ContinuationController::new(
            self.client.clone(),
            self.settings.grammar.clone(),
            self.settings.continuation_retries,
        )
        .with_inspector(self.inspector.clone());

        let mut outputs: Vec<String> = Vec::with_capacity(chunks.len());
        let mut commentary = String::new();
        let mut status = RunStatus::Success;
        let mut truncated: Vec<String> = Vec::new();
        let mut malformed: Vec<String> = Vec::new();
        let mut calls = 0;

        // Protocol problems are recorded and the loop goes on; only errors stop it
        for chunk in chunks {
            if chunk.total > 1 {
                info!(chunk = %chunk.label(), "Processing chunk");
            } else {
                info!("Processing");
            }
            let reply = controller.process(factory.as_ref(), request, chunk).await?;
            calls += reply.calls;
            outputs.push(clean(reply.stdout()));

            let chunk_status = RunStatus::from(reply.outcome);
            match chunk_status {
                RunStatus::Truncated => truncated.push(chunk.label()),
                RunStatus::Malformed => malformed.push(chunk.label()),
                _ => {}
            }
            status = status.worst(chunk_status);
            if chunk.is_last() {
                commentary = reply.commentary().to_string();
            } else if !reply.commentary().is_empty() {
                debug!(chunk = %chunk.label(), commentary = reply.commentary(), "Chunk commentary");
            }
        }

        if status != RunStatus::Success && status != RunStatus::Unterminated {
            error!(
                truncated = truncated.len(),
                malformed = malformed.len(),
                total = chunks.len(),
                "Some chunks produced incomplete output"
            );
        }
        let diagnostic = self.protocol_diagnostic(&truncated, &malformed, chunks.len());

        Ok(RunReport {
            output: aggregate(&outputs),
            commentary,
            status,
            generated_program: None,
            diagnostic,
            calls,
        })
    }

    fn protocol_diagnostic(
        &self,
        truncated: &[String],
        malformed: &[String],
        total: usize,
    ) -> Option<String> {
        let position = |labels: &[String]| {
            if total > 1 {
                format!(" (chunk {})", labels.join(", "))
            } else {
                String::new()
            }
        };
        let mut problems = Vec::new();
        if !truncated.is_empty() {
            problems.push(format!(
                "Token limit exceeded{}: the model could not finish its reply within its token \
                 limit (continuation budget --cont/TULP_CONT = {}). Allow more continuations, \
                 lower --max-chars/TULP_MAX_CHARS (currently {}), use a different model or \
                 simplify the request. Partial output was kept.",
                position(truncated),
                self.settings.continuation_retries,
                self.settings.max_chars
            ));
        }
        if !malformed.is_empty() {
            problems.push(format!(
                "The model reply{} did not follow the expected response format; try a \
                 different request or model.",
                position(malformed)
            ));
        }
        if problems.is_empty() {
            None
        } else {
            Some(problems.join("\n"))
        }
    }

    async fn run_execution(
        &self,
        mode: PromptMode,
        request: &str,
        sample: &Chunk,
        input: &str,
    ) -> Result<RunReport, TulpError> {
        let factory = mode.factory(&self.settings.grammar, &self.settings.interpreter);
        debug!(prompt = factory.name(), "Prompt selected");
        let controller = ExecutionController::new(
            self.client.clone(),
            self.runner.clone(),
            self.settings.grammar.clone(),
            self.settings.max_execution_retries,
        )
        .with_inspector(self.inspector.clone());

        let report = controller
            .run(factory.as_ref(), request, &sample.text, input)
            .await?;

        let (status, diagnostic) = if report.succeeded {
            (RunStatus::Success, None)
        } else {
            let failure = TulpError::ExecutionFailed {
                attempts: report.attempts.len() as u32,
                last_error: report.last_error().unwrap_or_default(),
            };
            (RunStatus::ExecutionFailed, Some(failure.to_string()))
        };

        Ok(RunReport {
            output: report.stdout,
            commentary: report.commentary,
            status,
            generated_program: Some(report.program),
            diagnostic,
            calls: report.calls,
        })
    }
}
