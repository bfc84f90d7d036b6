//! Standard input acquisition and request resolution.

use crate::error::TulpError;
use crate::prompt::DEFAULT_FILTER_REQUEST;
use std::io::{BufRead, IsTerminal, Read, Write};
use tracing::debug;

/// What arrived on standard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinInput {
    /// Stdin is a terminal; nothing was read.
    Terminal,
    /// Piped data, lossily decoded and trimmed (possibly empty).
    Piped(String),
}

impl StdinInput {
    pub fn text(&self) -> &str {
        match self {
            StdinInput::Terminal => "",
            StdinInput::Piped(text) => text,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StdinInput::Terminal)
    }
}

/// Read all of stdin unless it is a terminal.
pub fn read_stdin() -> Result<StdinInput, TulpError> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(StdinInput::Terminal);
    }
    let mut bytes = Vec::new();
    stdin.lock().read_to_end(&mut bytes)?;
    Ok(StdinInput::Piped(decode_input(&bytes)))
}

/// Lossy UTF-8 decode, surrounding whitespace trimmed.
pub fn decode_input(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Prompt on stderr and read one line from `reader`.
pub fn prompt_for_request<R: BufRead, W: Write>(
    reader: &mut R,
    prompt: &mut W,
) -> Result<String, TulpError> {
    write!(prompt, "Enter your request: ")?;
    prompt.flush()?;
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Decide the request for this run.
///
/// Positional words win. Piped input without words gets the default filtering
/// request. With neither, the request is read interactively when stdin is a terminal.
pub fn resolve_request<F>(
    words: &[String],
    input: &StdinInput,
    interactive: F,
) -> Result<String, TulpError>
where
    F: FnOnce() -> Result<String, TulpError>,
{
    let request = words.join(" ").trim().to_string();
    if !request.is_empty() {
        return Ok(request);
    }
    if !input.text().is_empty() {
        debug!("No request given; using the default filtering request");
        return Ok(DEFAULT_FILTER_REQUEST.to_string());
    }
    if input.is_terminal() {
        let request = interactive()?;
        if request.is_empty() {
            return Err(TulpError::ConfigError("No request was entered".to_string()));
        }
        return Ok(request);
    }
    Err(TulpError::ConfigError(
        "Nothing to do: no request was given and standard input is empty".to_string(),
    ))
}
