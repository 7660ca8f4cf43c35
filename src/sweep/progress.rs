//! Append-only progress trail.
//!
//! One JSON line per pass, one file per target space. The pipeline never
//! reads the trail back; resumption comes from re-reading the space itself.

use crate::models::ProgressRecord;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Writes progress records to a JSONL file.
#[derive(Debug, Clone)]
pub struct ProgressRecorder {
    path: PathBuf,
}

impl ProgressRecorder {
    /// Creates a recorder for `path`; the file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a single line.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub fn append(&self, record: &ProgressRecord) -> Result<()> {
        let line = serde_json::to_string(record).map_err(|e| Error::OperationFailed {
            operation: "serialize_progress_record".to_string(),
            cause: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_progress_dir".to_string(),
                cause: e.to_string(),
            })?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|e| Error::OperationFailed {
            operation: "open_progress_log".to_string(),
            cause: format!("{}: {e}", self.path.display()),
        })?;

        writeln!(file, "{line}").map_err(|e| Error::OperationFailed {
            operation: "write_progress_record".to_string(),
            cause: e.to_string(),
        })?;
        file.flush().map_err(|e| Error::OperationFailed {
            operation: "flush_progress_log".to_string(),
            cause: e.to_string(),
        })
    }

    /// Reads every record, for operators and tests.
    ///
    /// A missing file reads as empty. Unparseable lines are skipped with a
    /// warning, so a torn final line does not hide earlier passes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read_all(&self) -> Result<Vec<ProgressRecord>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::OperationFailed {
                    operation: "open_progress_log".to_string(),
                    cause: e.to_string(),
                });
            },
        };

        let mut records = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::OperationFailed {
                operation: "read_progress_log".to_string(),
                cause: e.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(line = number + 1, "Skipping unreadable progress line: {e}"),
            }
        }
        Ok(records)
    }
}
