//! CLI parse: clap types for tulp. No behavior; definitions only.

use crate::config::ConfigOverrides;
use clap::Parser;
use std::path::PathBuf;

/// tulp - a Unix filter driven by natural-language instructions
#[derive(Parser, Debug)]
#[command(name = "tulp", version)]
#[command(
    about = "Process piped input (or answer a request) with a language model, like a Unix filter",
    after_help = "Examples:\n  cat data.csv | tulp convert to json\n  \
                  tulp -x list the prime numbers below 100\n  \
                  cat access.log | tulp -x -w report.py count requests per status code"
)]
pub struct Cli {
    /// What to do with the input (words are joined with spaces)
    #[arg(value_name = "REQUEST")]
    pub request: Vec<String>,

    /// Generate a program, run it on the input and repair it on failure
    #[arg(short = 'x', long)]
    pub execute: bool,

    /// Write the output (or, with -x, the generated program) to FILE
    #[arg(short = 'w', long = "write", value_name = "FILE")]
    pub write: Option<PathBuf>,

    /// Model to use (see --list-models)
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum characters sent per chunk
    #[arg(long, value_name = "N")]
    pub max_chars: Option<usize>,

    /// Continuation requests allowed per chunk when a reply is cut short
    #[arg(long = "cont", value_name = "N")]
    pub cont: Option<u32>,

    /// Record every request and reply as JSON under DIR
    #[arg(long, value_name = "DIR")]
    pub inspect_dir: Option<PathBuf>,

    /// Configuration file path (replaces the global config file)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// OpenAI API key
    #[arg(long)]
    pub openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[arg(long)]
    pub openai_baseurl: Option<String>,

    /// Anthropic API key
    #[arg(long)]
    pub anthropic_api_key: Option<String>,

    /// Groq API key
    #[arg(long)]
    pub groq_api_key: Option<String>,

    /// Gemini API key
    #[arg(long)]
    pub gemini_api_key: Option<String>,

    /// Ollama host URL
    #[arg(long)]
    pub ollama_host: Option<String>,

    /// List the supported model patterns and exit
    #[arg(long)]
    pub list_models: bool,

    /// Print the effective configuration (credentials masked) and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// Values that override every configuration layer.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            model: self.model.clone(),
            max_chars: self.max_chars,
            continuation_retries: self.cont,
            write_file: self.write.clone(),
            execute: self.execute,
            inspect_dir: self.inspect_dir.clone(),
            openai_api_key: self.openai_api_key.clone(),
            openai_baseurl: self.openai_baseurl.clone(),
            anthropic_api_key: self.anthropic_api_key.clone(),
            groq_api_key: self.groq_api_key.clone(),
            gemini_api_key: self.gemini_api_key.clone(),
            ollama_host: self.ollama_host.clone(),
        }
    }
}
