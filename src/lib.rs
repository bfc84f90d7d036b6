//! tulp: a Unix filter driven by natural-language instructions
//!
//! Turns a request plus piped input into one deterministic answer from a language
//! model. The engine chunks the input, imposes a tagged-block grammar on the replies,
//! resumes replies cut short by token limits, and in execution mode generates, runs and
//! repairs a throwaway program against the real input.

pub mod chunker;
pub mod cli;
pub mod config;
pub mod continuation;
pub mod engine;
pub mod error;
pub mod execution;
pub mod exit_codes;
pub mod input;
pub mod inspect;
pub mod logging;
pub mod output;
pub mod parser;
pub mod prompt;
pub mod protocol;
pub mod provider;

pub use engine::{Engine, EngineSettings, RunReport, RunStatus};
pub use error::TulpError;
