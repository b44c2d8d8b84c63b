//! Per-run working directory.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Error type for working directory creation
#[derive(Debug, Error)]
pub enum WorkdirError {
    #[error("Failed to create working directory under {root}: {source}")]
    Io {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A uniquely named directory holding one run's intermediate and final files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    /// Create `<output_root>/<unix-millis>`.
    ///
    /// The leaf is created with `create_dir`, so a name already taken by a
    /// concurrent run fails with `AlreadyExists` and the next millisecond
    /// value is tried instead.
    pub fn create(output_root: &Path) -> Result<Self, WorkdirError> {
        let wrap = |source| WorkdirError::Io {
            root: output_root.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(output_root).map_err(wrap)?;
        let root = std::fs::canonicalize(output_root).map_err(wrap)?;

        let mut stamp = timestamp_ms();
        loop {
            let candidate = root.join(stamp.to_string());
            match std::fs::create_dir(&candidate) {
                Ok(()) => return Ok(Self { path: candidate }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(wrap(e)),
            }
        }
    }

    /// Absolute path of the directory
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Get current timestamp in milliseconds
fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
