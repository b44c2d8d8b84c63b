//! Command builders for the two external conversion tools.

pub mod dfpwm;
pub mod transcode;

pub use dfpwm::{build_encode_command, EncodeParams, TARGET_EXTENSION};
pub use transcode::{build_transcode_command, TranscodeParams, INTERMEDIATE_EXTENSION};
