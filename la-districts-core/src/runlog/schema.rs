use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RunLogError;

/// Column order of the run log. Matches the field order of [`crate::models::RunRecord`].
pub const HEADERS: [&str; 12] = [
    "run_id",
    "timestamp",
    "district",
    "url",
    "status_code",
    "schema_ok",
    "record_count",
    "file_size_kb",
    "result",
    "error",
    "file_written",
    "elapsed_sec",
];

/// Append-only CSV log with one row per endpoint attempt.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the log (and its directory) with the header row. A log that
    /// already has content is left untouched.
    pub fn initialize(&self) -> Result<(), RunLogError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| self.io_err(source))?;
        }

        let has_content = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() > 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(self.io_err(e)),
        };
        if has_content {
            return Ok(());
        }

        let mut writer = csv::Writer::from_path(&self.path).map_err(|source| self.csv_err(source))?;
        writer.write_record(HEADERS).map_err(|source| self.csv_err(source))?;
        writer.flush().map_err(|source| self.io_err(source))?;
        Ok(())
    }

    pub(crate) fn io_err(&self, source: std::io::Error) -> RunLogError {
        RunLogError::Io { path: self.path.clone(), source }
    }

    pub(crate) fn csv_err(&self, source: csv::Error) -> RunLogError {
        RunLogError::Csv { path: self.path.clone(), source }
    }
}
