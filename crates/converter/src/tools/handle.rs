//! Resolved tool locations.

use std::io;
use std::path::{Path, PathBuf};

/// Where a tool handle came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Already on disk before this run
    PreExisting,
    /// Downloaded or extracted by this run
    Provisioned,
}

/// Absolute path to an external executable plus its provenance.
///
/// Temporary handles (the extracted payload) own their file and delete it in
/// [`ToolHandle::release`]; persistent ones (the transcoder cache) never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolHandle {
    path: PathBuf,
    provenance: Provenance,
    temporary: bool,
}

impl ToolHandle {
    /// Handle to a file that outlives the run
    pub fn persistent(path: PathBuf, provenance: Provenance) -> Self {
        Self {
            path,
            provenance,
            temporary: false,
        }
    }

    /// Handle to a file created for this run only
    pub fn temporary(path: PathBuf) -> Self {
        Self {
            path,
            provenance: Provenance::Provisioned,
            temporary: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Delete the backing file if this handle is temporary.
    ///
    /// Persistent handles are a no-op. The error is returned for logging;
    /// callers are expected to ignore it.
    pub fn release(self) -> io::Result<()> {
        if self.temporary {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
