//! Shared test utilities for integration tests
//!
//! Scripted backend and program runner doubles, reply builders, and serialized access
//! to the process environment.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tulp::execution::{ProgramOutput, ProgramRunner};
use tulp::provider::{FinishReason, LlmClient, Message, RawReply};
use tulp::TulpError;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Backend double that replays a fixed list of replies and records every request.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<RawReply>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<RawReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn stopping(contents: &[String]) -> Arc<Self> {
        Self::new(
            contents
                .iter()
                .map(|c| RawReply::assistant(c.clone(), FinishReason::Stop))
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn generate(&self, messages: &[Message]) -> Result<RawReply, TulpError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| RawReply::error("script exhausted")))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

/// Runner double: each call pops the next scripted output.
pub struct FakeRunner {
    outputs: Mutex<VecDeque<ProgramOutput>>,
    programs: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new(outputs: Vec<ProgramOutput>) -> Arc<Self> {
        Arc::new(Self {
            outputs: Mutex::new(outputs.into()),
            programs: Mutex::new(Vec::new()),
        })
    }

    pub fn programs(&self) -> Vec<String> {
        self.programs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgramRunner for FakeRunner {
    async fn run(&self, program: &str, _input: &str) -> Result<ProgramOutput, TulpError> {
        self.programs.lock().unwrap().push(program.to_string());
        Ok(self.outputs.lock().unwrap().pop_front().unwrap_or(ProgramOutput {
            stdout: String::new(),
            stderr: "no scripted output".to_string(),
            exit_code: Some(1),
        }))
    }
}

pub fn ok_output(stdout: &str) -> ProgramOutput {
    ProgramOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
    }
}

pub fn failed_output(stderr: &str) -> ProgramOutput {
    ProgramOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: Some(1),
    }
}

/// Complete verbose-grammar reply with a stdout block and optional commentary.
pub fn verbose_reply(stdout: &str, stderr: &str) -> String {
    let mut reply = format!(
        "<|||reply_start|||>\n<|||dev_file_start=stdout|||>\n{}\n<|||dev_file_end|||>\n",
        stdout
    );
    if !stderr.is_empty() {
        reply.push_str(&format!(
            "<|||dev_file_start=stderr|||>\n{}\n<|||dev_file_end|||>\n",
            stderr
        ));
    }
    reply.push_str("<|||reply_end|||>");
    reply
}

/// Complete terse-grammar reply with a stdout block.
pub fn terse_reply(stdout: &str) -> String {
    format!("(#reply_start)\n(#stdout)\n{}\n(#end)\n(#reply_end)", stdout)
}

/// Run `f` with `TULP_*` variables cleared and `XDG_CONFIG_HOME` pointing into
/// `test_dir`; the previous environment is restored afterwards.
pub fn with_clean_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| key.starts_with("TULP_") || key == "XDG_CONFIG_HOME")
        .collect();
    for (key, _) in &saved {
        std::env::remove_var(key);
    }
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());

    let result = f();

    for (key, _) in std::env::vars() {
        if key.starts_with("TULP_") || key == "XDG_CONFIG_HOME" {
            std::env::remove_var(key);
        }
    }
    for (key, value) in saved {
        std::env::set_var(key, value);
    }
    result
}
