//! Output Aggregator
//!
//! Joins per-chunk output, strips a wrapping code fence some backends add, and hands
//! the final text to its sink: standard output, or a file with backup rotation.

use crate::error::TulpError;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

fn is_opening_fence(line: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```[\w+.-]*\s*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(line))
}

/// Join per-chunk outputs in order, one line break between non-empty parts.
pub fn aggregate<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip one pair of fences wrapping the whole trimmed text. Anything else, including
/// fences that only wrap part of it, is returned unchanged.
pub fn clean(text: &str) -> String {
    let trimmed = text.trim();
    let lines: Vec<&str> = trimmed.lines().collect();
    let fence_lines = lines.iter().filter(|l| l.starts_with("```")).count();

    if lines.len() > 2
        && fence_lines == 2
        && is_opening_fence(lines[0])
        && lines[lines.len() - 1].trim_end() == "```"
    {
        info!("Stripping code fences wrapping the whole output");
        return lines[1..lines.len() - 1].join("\n");
    }
    text.to_string()
}

/// Ensure exactly one trailing newline; empty content stays empty.
fn with_trailing_newline(content: &str) -> String {
    let body = content.trim_end_matches(['\n', '\r']);
    if body.is_empty() {
        String::new()
    } else {
        format!("{}\n", body)
    }
}

/// Write final output to a writer (normally standard output).
pub fn write_stdout<W: Write>(out: &mut W, content: &str) -> std::io::Result<()> {
    out.write_all(with_trailing_newline(content).as_bytes())?;
    out.flush()
}

/// File sink that never silently overwrites an existing file.
pub struct OutputWriter;

impl OutputWriter {
    /// First free `<stem>.backup-N<.ext>` name next to `path`.
    pub fn backup_path(path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let mut counter = 1;
        loop {
            let candidate = path.with_file_name(format!("{}.backup-{}{}", stem, counter, extension));
            if !candidate.exists() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Write `content` to `path`, moving any existing file to a backup first.
    /// Returns the backup location when one was made.
    pub fn write_to_file(path: &Path, content: &str) -> Result<Option<PathBuf>, TulpError> {
        let output_error = |message: String| TulpError::OutputError {
            path: path.to_path_buf(),
            message,
        };

        if path.is_dir() {
            return Err(output_error("target is a directory".to_string()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| output_error(format!("cannot create directory: {}", e)))?;
            }
        }

        let backup = if path.exists() {
            let backup = Self::backup_path(path);
            std::fs::rename(path, &backup)
                .map_err(|e| output_error(format!("cannot move existing file aside: {}", e)))?;
            warn!(
                existing = %path.display(),
                backup = %backup.display(),
                "Output file already exists; moved it aside"
            );
            Some(backup)
        } else {
            None
        };

        std::fs::write(path, with_trailing_newline(content))
            .map_err(|e| output_error(e.to_string()))?;
        debug!(path = %path.display(), bytes = content.len(), "Output written");
        Ok(backup)
    }
}

/// Where the final text goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    pub fn from_option(path: Option<&Path>) -> Self {
        match path {
            Some(path) => OutputTarget::File(path.to_path_buf()),
            None => OutputTarget::Stdout,
        }
    }

    /// Emit `content`. When the file cannot be written the content is printed to
    /// `stdout` instead and the write error is returned.
    pub fn emit<W: Write>(&self, content: &str, stdout: &mut W) -> Result<(), TulpError> {
        match self {
            OutputTarget::Stdout => Ok(write_stdout(stdout, content)?),
            OutputTarget::File(path) => match OutputWriter::write_to_file(path, content) {
                Ok(_) => {
                    info!(path = %path.display(), "Output written to file");
                    Ok(())
                }
                Err(err) => {
                    warn!(error = %err, "Falling back to standard output");
                    write_stdout(stdout, content)?;
                    Err(err)
                }
            },
        }
    }
}
