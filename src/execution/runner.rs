//! Generated program runner.
//!
//! Runs a program through an interpreter in a child process, feeding the full input
//! on stdin while stdout and stderr are captured independently.

use crate::error::TulpError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of one program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramOutput {
    pub stdout: String,
    pub stderr: String,
    /// None when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ProgramOutput {
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait ProgramRunner: Send + Sync {
    /// Run `program`, writing `input` to its stdin. `Err` only when the process could
    /// not be started or waited on; a failing program is an `Ok` with non-zero exit.
    async fn run(&self, program: &str, input: &str) -> Result<ProgramOutput, TulpError>;
}

/// Runs `<interpreter> -c <program>`.
pub struct InterpreterRunner {
    interpreter: String,
}

impl InterpreterRunner {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

#[async_trait]
impl ProgramRunner for InterpreterRunner {
    async fn run(&self, program: &str, input: &str) -> Result<ProgramOutput, TulpError> {
        debug!(interpreter = %self.interpreter, bytes = program.len(), "Spawning program");
        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TulpError::ConfigError(format!(
                    "Cannot start interpreter '{}': {}",
                    self.interpreter, e
                ))
            })?;

        let stdin = child.stdin.take();
        let data = input.as_bytes().to_vec();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&data).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        if let Err(e) = fed {
            // A program that exits without reading all of its input closes the pipe early
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                warn!(error = %e, "Failed to write input to program");
            }
        }
        let output = output?;

        Ok(ProgramOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}
