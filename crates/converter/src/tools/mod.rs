//! External tool provisioning.
//!
//! The pipeline needs two executables before its stages can run: the
//! transcoder (cached on disk, downloaded on first use) and the encoder
//! payload (bundled in this binary, extracted to a temp file per run).

pub mod handle;
pub mod payload;
pub mod transcoder;

pub use handle::{Provenance, ToolHandle};
pub use payload::{BundledAssets, PayloadExtractor, PayloadSource};
pub use transcoder::{platform_key, FfbinariesFetcher, ReleaseFetcher, TranscoderProvisioner};

use std::path::PathBuf;
use thiserror::Error;

/// Error type for tool provisioning. Every variant is fatal to a run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// IO error while scanning, extracting or writing a tool
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error while fetching the release index or archive
    #[error("Download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// The downloaded archive could not be read
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The release index lacks an entry we need
    #[error("Release index error: {0}")]
    Index(String),

    /// Nothing matched the transcoder pattern, even after downloading
    #[error("No file matching '*{pattern}*' found in {dir}")]
    TranscoderNotFound { pattern: String, dir: PathBuf },

    /// No bundled asset carries the payload suffix
    #[error("Unable to locate embedded resource with suffix '{suffix}'")]
    PayloadMissing { suffix: String },

    /// The bundled asset exists but cannot be read
    #[error("Unable to extract embedded resource '{name}'")]
    PayloadUnreadable { name: String },

    /// A blocking extraction task panicked
    #[error("Extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
