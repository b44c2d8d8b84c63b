//! Transcoder (stage 1) command construction.
//!
//! Decodes any audio the transcoder understands into the uncompressed
//! intermediate format the encoder payload accepts.

use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Extension of the intermediate files written by stage 1
pub const INTERMEDIATE_EXTENSION: &str = "wav";

/// Parameters for a single transcoder invocation
#[derive(Debug, Clone)]
pub struct TranscodeParams {
    /// Resolved transcoder executable
    pub executable: PathBuf,
    /// Source audio file
    pub input_path: PathBuf,
    /// Intermediate file to write (overwritten if present)
    pub output_path: PathBuf,
}

/// Build the transcoder command
///
/// Produces `<exe> -y -i <input> -loglevel quiet <output>`. Arguments are
/// passed as separate argv entries, so no shell quoting is involved. The
/// tool's own stdio is discarded.
pub fn build_transcode_command(params: &TranscodeParams) -> Command {
    let mut cmd = Command::new(&params.executable);

    cmd.arg("-y");
    cmd.arg("-i").arg(&params.input_path);
    cmd.arg("-loglevel").arg("quiet");
    cmd.arg(&params.output_path);

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    cmd
}
