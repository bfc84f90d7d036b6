//! CLI output: stable user-facing text for errors and run diagnostics on stderr.

use crate::error::TulpError;
use std::io::Write;

/// Map an error to the message shown to the user.
pub fn map_error(e: &TulpError) -> String {
    match e {
        TulpError::BackendDeclared(content) => {
            format!("Error: couldn't process your request:\n{}", content)
        }
        TulpError::UnknownModel { .. } | TulpError::ConfigError(_) => {
            format!("tulp: {}\nRun `tulp --help` for usage.", e)
        }
        TulpError::Interrupted => "tulp: interrupted".to_string(),
        other => format!("tulp: {}", other),
    }
}

/// Final-chunk commentary, kept off stdout.
pub fn write_commentary<W: Write>(err: &mut W, commentary: &str) -> std::io::Result<()> {
    let commentary = commentary.trim();
    if commentary.is_empty() {
        return Ok(());
    }
    writeln!(err, "{}", commentary)
}

pub fn write_diagnostic<W: Write>(err: &mut W, diagnostic: &str) -> std::io::Result<()> {
    writeln!(err, "tulp: {}", diagnostic)
}
