//! Encoder (stage 2) command construction.
//!
//! The encoder is a Java archive bundled with this program; it is launched
//! through the configured Java runtime.

use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Extension of the final files written by stage 2
pub const TARGET_EXTENSION: &str = "dfpwm";

/// Parameters for a single encoder invocation
#[derive(Debug, Clone)]
pub struct EncodeParams {
    /// Java runtime (program name or path)
    pub java: PathBuf,
    /// Extracted encoder payload
    pub payload: PathBuf,
    /// Intermediate file produced by stage 1
    pub input_path: PathBuf,
    /// Target file to write
    pub output_path: PathBuf,
}

/// Build the encoder command: `<java> -jar <payload> <input> <output>`.
pub fn build_encode_command(params: &EncodeParams) -> Command {
    let mut cmd = Command::new(&params.java);

    cmd.arg("-jar").arg(&params.payload);
    cmd.arg(&params.input_path);
    cmd.arg(&params.output_path);

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_encode_command_layout() {
        let params = EncodeParams {
            java: PathBuf::from("java"),
            payload: PathBuf::from("/tmp/cc-music-1234.jar"),
            input_path: PathBuf::from("/out/1700000000000/my song.wav"),
            output_path: PathBuf::from("/out/1700000000000/my song.dfpwm"),
        };

        let cmd = build_encode_command(&params);
        let args: Vec<&OsStr> = cmd.get_args().collect();

        assert_eq!(cmd.get_program(), OsStr::new("java"));
        assert_eq!(
            args,
            vec![
                OsStr::new("-jar"),
                OsStr::new("/tmp/cc-music-1234.jar"),
                OsStr::new("/out/1700000000000/my song.wav"),
                OsStr::new("/out/1700000000000/my song.dfpwm"),
            ]
        );
    }

    #[test]
    fn test_encode_command_uses_configured_runtime() {
        let params = EncodeParams {
            java: PathBuf::from("/opt/jdk-21/bin/java"),
            payload: PathBuf::from("p.jar"),
            input_path: PathBuf::from("a.wav"),
            output_path: PathBuf::from("a.dfpwm"),
        };

        let cmd = build_encode_command(&params);
        assert_eq!(cmd.get_program(), OsStr::new("/opt/jdk-21/bin/java"));
    }
}
