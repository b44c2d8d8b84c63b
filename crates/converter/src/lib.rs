//! CC Music Converter
//!
//! Batch-converts audio files to DFPWM in two stages: any input format to an
//! intermediate WAV through an external transcoder, then WAV to DFPWM
//! through a bundled Java encoder. Each stage runs at most ten external
//! processes at once, and a failing file never stops its siblings.

pub mod encode;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod scan;
pub mod stage;
pub mod startup;
pub mod tools;
pub mod workdir;

pub use cc_music_converter_config as config;
pub use cc_music_converter_config::Config;
pub use logging::{init_logging, LogGuard};
pub use pipeline::{Pipeline, PipelineError, PipelineState, RunSummary};
pub use sanitize::{sanitize, SanitizeError, SanitizePolicy};
pub use stage::{StageReport, StageRunner, TaskError, MAX_CONCURRENT_PROCESSES};
pub use startup::{check_java_available, StartupError};
pub use tools::{ProvisionError, ToolHandle};
pub use workdir::{WorkdirError, WorkingDirectory};
