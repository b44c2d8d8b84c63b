//! Startup checks module
//!
//! Preflight checks run before any file is touched:
//! - Java runtime availability (the encoder payload needs it)
//! - Transcoder version detection, for the log

use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Java runtime not available: {0}")]
    JavaUnavailable(String),
}

/// Check that the Java runtime starts by running `<java> -version`
///
/// Java is an external precondition of stage 2; without it every encode
/// would fail one by one, so the run is refused up front instead.
pub fn check_java_available(java: &Path) -> Result<(), StartupError> {
    let status = Command::new(java)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| {
            StartupError::JavaUnavailable(format!(
                "{} -version failed; is a Java runtime installed and in PATH? Error: {}",
                java.display(),
                e
            ))
        })?;

    if !status.success() {
        return Err(StartupError::JavaUnavailable(format!(
            "{} -version exited with {}",
            java.display(),
            status
        )));
    }

    Ok(())
}

/// Extract the version token from transcoder `-version` output
///
/// Handles the standard `ffmpeg version 6.1.1 ...` line as well as
/// git builds such as `ffmpeg version n6.1-3-gabc ...` and
/// `ffmpeg version N-112345-gabc ...`.
pub fn parse_transcoder_version(version_output: &str) -> Option<String> {
    version_output.lines().find_map(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        tokens
            .windows(3)
            .find(|w| w[0].eq_ignore_ascii_case("ffmpeg") && w[1].eq_ignore_ascii_case("version"))
            .map(|w| w[2].trim_start_matches('n').to_string())
            .filter(|token| !token.is_empty())
    })
}

/// Run `<exe> -version` and return the parsed version, if any
pub fn detect_transcoder_version(executable: &Path) -> Option<String> {
    let output = Command::new(executable)
        .arg("-version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_transcoder_version(&String::from_utf8_lossy(&output.stdout))
}
