//! Request/response inspection log.
//!
//! One pretty-printed JSON file per backend call under `<dir>/<YYYYmmdd_HHMMSS>_<pid>/`,
//! named `<label>_<NNN>.json`. Write failures are logged and never abort a run.

use crate::error::TulpError;
use crate::provider::{Message, RawReply};
use chrono::{Local, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

const RUN_DIR_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Serialize)]
struct InspectRecord<'a> {
    label: &'a str,
    sequence: usize,
    recorded_at: String,
    request: &'a [Message],
    reply: &'a RawReply,
}

pub struct Inspector {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl Inspector {
    /// Create the per-run subdirectory under `base`, named `<timestamp>_<pid>` with a
    /// `_N` suffix when a run in the same second already took that name.
    pub fn open(base: &Path) -> Result<Self, TulpError> {
        let create_error = |path: &Path, e: std::io::Error| TulpError::OutputError {
            path: path.to_path_buf(),
            message: format!("cannot create inspection directory: {}", e),
        };
        std::fs::create_dir_all(base).map_err(|e| create_error(base, e))?;

        let stem = format!(
            "{}_{}",
            Local::now().format(RUN_DIR_FORMAT),
            std::process::id()
        );
        let mut attempt = 1;
        let dir = loop {
            let candidate = if attempt == 1 {
                base.join(&stem)
            } else {
                base.join(format!("{}_{}", stem, attempt))
            };
            match std::fs::create_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(create_error(&candidate, e)),
            }
        };
        debug!(dir = %dir.display(), "Inspection directory ready");
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one exchange. Returns the written path, or `None` if writing failed.
    pub fn record(&self, label: &str, request: &[Message], reply: &RawReply) -> Option<PathBuf> {
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.dir.join(format!("{}_{:03}.json", sanitize(label), sequence));
        let record = InspectRecord {
            label,
            sequence,
            recorded_at: Utc::now().to_rfc3339(),
            request,
            reply,
        };

        let json = match serde_json::to_string_pretty(&record) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize inspection record");
                return None;
            }
        };
        match std::fs::write(&path, json) {
            Ok(()) => {
                debug!(path = %path.display(), "Inspection record written");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write inspection record");
                None
            }
        }
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
