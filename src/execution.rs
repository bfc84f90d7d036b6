//! Execution Controller
//!
//! Generate, run, repair. The backend is asked for a standalone program, the program is
//! run against the full input, and a failing run is fed back for a corrected version.
//! Backend calls are bounded by `max_retries`, so subprocess runs are too.

pub mod runner;

pub use runner::{InterpreterRunner, ProgramOutput, ProgramRunner};

use crate::error::TulpError;
use crate::inspect::Inspector;
use crate::output::clean;
use crate::parser::parse;
use crate::prompt::{missing_program_message, repair_message, PromptFactory};
use crate::protocol::{BlockName, TagGrammar};
use crate::provider::{LlmClient, Message, RawReply};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One run of a generated program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionAttempt {
    pub generated_code: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ExecutionAttempt {
    fn new(generated_code: String, output: ProgramOutput) -> Self {
        Self {
            generated_code,
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// What is sent back for repair: stderr, or stdout when stderr is empty.
    pub fn error_output(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Outcome of the generate-execute-repair loop.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Last program that was run.
    pub program: String,
    /// Captured stdout of the last run (partial output when it failed).
    pub stdout: String,
    /// `stderr` block of the last reply.
    pub commentary: String,
    pub attempts: Vec<ExecutionAttempt>,
    /// Backend calls made, including ones that carried no program.
    pub calls: u32,
    pub succeeded: bool,
}

impl ExecutionReport {
    pub fn last_error(&self) -> Option<String> {
        self.attempts.last().map(|attempt| {
            let output = attempt.error_output().trim();
            match attempt.exit_code {
                Some(code) if output.is_empty() => format!("exit code {}", code),
                Some(code) => format!("exit code {}: {}", code, output),
                None if output.is_empty() => "terminated by a signal".to_string(),
                None => format!("terminated by a signal: {}", output),
            }
        })
    }
}

pub struct ExecutionController {
    client: Arc<dyn LlmClient>,
    runner: Arc<dyn ProgramRunner>,
    grammar: TagGrammar,
    max_retries: u32,
    inspector: Option<Arc<Inspector>>,
}

impl ExecutionController {
    pub fn new(
        client: Arc<dyn LlmClient>,
        runner: Arc<dyn ProgramRunner>,
        grammar: TagGrammar,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            runner,
            grammar,
            max_retries,
            inspector: None,
        }
    }

    pub fn with_inspector(mut self, inspector: Option<Arc<Inspector>>) -> Self {
        self.inspector = inspector;
        self
    }

    /// `sample` is what the backend sees of the input; `full_input` is what the
    /// program reads on stdin.
    pub async fn run(
        &self,
        factory: &dyn PromptFactory,
        request: &str,
        sample: &str,
        full_input: &str,
    ) -> Result<ExecutionReport, TulpError> {
        let mut messages = factory.messages(request, sample, 1, 1);
        let mut attempts: Vec<ExecutionAttempt> = Vec::new();
        let mut commentary = String::new();
        let mut calls: u32 = 0;

        while calls < self.max_retries {
            calls += 1;
            let reply = self.call(&messages, calls).await?;
            let blocks = parse(&reply.content, &self.grammar);

            // Same rule as the chunk loop: an empty error block is not a refusal
            if blocks.is_nonempty(BlockName::Error) {
                return Err(TulpError::BackendDeclared(
                    blocks.content(BlockName::Error).to_string(),
                ));
            }
            commentary = blocks.content(BlockName::Stderr).to_string();

            let program = clean(blocks.content(BlockName::Stdout));
            if program.trim().is_empty() {
                warn!(attempt = calls, "Reply carried no program; asking again");
                messages.push(reply.to_message());
                messages.push(missing_program_message(&self.grammar));
                continue;
            }

            debug!(attempt = calls, bytes = program.len(), "Running generated program");
            let output = self.runner.run(&program, full_input).await?;
            let attempt = ExecutionAttempt::new(program, output);

            if attempt.succeeded() {
                info!(attempt = calls, "Generated program succeeded");
                attempts.push(attempt);
                return Ok(self.report(attempts, commentary, calls, true));
            }

            warn!(
                attempt = calls,
                max_retries = self.max_retries,
                exit_code = ?attempt.exit_code,
                "Generated program failed; requesting a fix"
            );
            messages.push(reply.to_message());
            messages.push(repair_message(&self.grammar, attempt.error_output()));
            attempts.push(attempt);
        }

        if attempts.is_empty() {
            return Err(TulpError::MissingProgram { attempts: calls });
        }
        Ok(self.report(attempts, commentary, calls, false))
    }

    fn report(
        &self,
        attempts: Vec<ExecutionAttempt>,
        commentary: String,
        calls: u32,
        succeeded: bool,
    ) -> ExecutionReport {
        let (program, stdout) = attempts
            .last()
            .map(|a| (a.generated_code.clone(), a.stdout.clone()))
            .unwrap_or_default();
        ExecutionReport {
            program,
            stdout,
            commentary,
            attempts,
            calls,
            succeeded,
        }
    }

    async fn call(&self, messages: &[Message], attempt: u32) -> Result<RawReply, TulpError> {
        let reply = self.client.generate(messages).await?;
        if let Some(inspector) = &self.inspector {
            inspector.record(&format!("exec_attempt_{}", attempt), messages, &reply);
        }
        if reply.is_error() {
            return Err(reply.into_error());
        }
        Ok(reply)
    }
}
