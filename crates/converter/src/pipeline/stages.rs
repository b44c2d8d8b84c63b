//! The two concrete stages of a conversion run.

use crate::encode::{
    build_encode_command, build_transcode_command, EncodeParams, TranscodeParams,
    INTERMEDIATE_EXTENSION, TARGET_EXTENSION,
};
use crate::sanitize::{sanitize, SanitizePolicy};
use crate::scan::relative_label;
use crate::stage::{StageSpec, StageTask, TaskError};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Remove a partial output left behind by a failed tool run
fn discard_partial(output: &Path, result: &Result<(), TaskError>) {
    if result.is_ok() {
        return;
    }
    match std::fs::remove_file(output) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Unable to delete partial output {}: {}", output.display(), e),
    }
}

fn file_name(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Stage 1: any audio file -> `<working_dir>/<sanitized>.wav`
pub struct TranscodeStage {
    pub executable: PathBuf,
    pub input_root: PathBuf,
    pub working_dir: PathBuf,
    pub policy: SanitizePolicy,
}

impl StageSpec for TranscodeStage {
    fn name(&self) -> &str {
        "WAV"
    }

    fn label(&self, input: &Path) -> String {
        relative_label(&self.input_root, input)
    }

    fn plan(&self, input: &Path) -> Result<StageTask, TaskError> {
        let stem = sanitize(&file_name(input), self.policy)?;
        let output = self
            .working_dir
            .join(format!("{}.{}", stem, INTERMEDIATE_EXTENSION));

        let command = build_transcode_command(&TranscodeParams {
            executable: self.executable.clone(),
            input_path: input.to_path_buf(),
            output_path: output.clone(),
        });
        Ok(StageTask { output, command })
    }

    fn finish(&self, _input: &Path, output: &Path, result: &Result<(), TaskError>) {
        discard_partial(output, result);
    }
}

/// Stage 2: `<working_dir>/<name>.wav` -> `<working_dir>/<name>.dfpwm`,
/// deleting the intermediate once the encoder has exited.
/// A failed encode also loses its partial target file.
pub struct EncodeStage {
    pub java: PathBuf,
    pub payload: PathBuf,
    pub working_dir: PathBuf,
}

impl StageSpec for EncodeStage {
    fn name(&self) -> &str {
        "DFPWM"
    }

    fn label(&self, input: &Path) -> String {
        relative_label(&self.working_dir, input)
    }

    fn plan(&self, input: &Path) -> Result<StageTask, TaskError> {
        // Stage 1 already normalized the name; case is kept as written
        let stem = sanitize(&file_name(input), SanitizePolicy::PreserveCase)?;
        let output = self
            .working_dir
            .join(format!("{}.{}", stem, TARGET_EXTENSION));

        let command = build_encode_command(&EncodeParams {
            java: self.java.clone(),
            payload: self.payload.clone(),
            input_path: input.to_path_buf(),
            output_path: output.clone(),
        });
        Ok(StageTask { output, command })
    }

    fn finish(&self, input: &Path, output: &Path, result: &Result<(), TaskError>) {
        discard_partial(output, result);
        if let Err(e) = std::fs::remove_file(input) {
            warn!("Unable to delete {}: {}", self.label(input), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    #[test]
    fn test_transcode_plan_uses_sanitized_flat_output() {
        let stage = TranscodeStage {
            executable: PathBuf::from("/tools/ffmpeg"),
            input_root: PathBuf::from("/music/input"),
            working_dir: PathBuf::from("/music/output/1700000000000"),
            policy: SanitizePolicy::Lowercase,
        };
        let input = Path::new("/music/input/Album/My Song!!.mp3");

        let task = stage.plan(input).unwrap();

        assert_eq!(
            task.output,
            PathBuf::from("/music/output/1700000000000/my_song.wav")
        );
        assert_eq!(task.command.get_program(), OsStr::new("/tools/ffmpeg"));
        assert_eq!(stage.label(input), Path::new("Album").join("My Song!!.mp3").to_string_lossy());
    }

    #[test]
    fn test_transcode_plan_rejects_empty_name() {
        let stage = TranscodeStage {
            executable: PathBuf::from("ffmpeg"),
            input_root: PathBuf::from("/in"),
            working_dir: PathBuf::from("/out"),
            policy: SanitizePolicy::PreserveCase,
        };

        assert!(matches!(
            stage.plan(Path::new("/in/???.flac")),
            Err(TaskError::Rejected(_))
        ));
    }

    #[test]
    fn test_encode_plan_keeps_stage_one_name() {
        let stage = EncodeStage {
            java: PathBuf::from("java"),
            payload: PathBuf::from("/tmp/cc-music-x.jar"),
            working_dir: PathBuf::from("/out/run"),
        };

        let task = stage.plan(Path::new("/out/run/My_Song.wav")).unwrap();

        assert_eq!(task.output, PathBuf::from("/out/run/My_Song.dfpwm"));
        let args: Vec<&OsStr> = task.command.get_args().collect();
        assert_eq!(args[0], OsStr::new("-jar"));
        assert_eq!(args[1], OsStr::new("/tmp/cc-music-x.jar"));
    }

    #[test]
    fn test_encode_finish_deletes_intermediate_even_on_failure() {
        let temp = TempDir::new().unwrap();
        let wav = temp.path().join("song.wav");
        std::fs::write(&wav, b"RIFF").unwrap();
        let stage = EncodeStage {
            java: PathBuf::from("java"),
            payload: PathBuf::from("p.jar"),
            working_dir: temp.path().to_path_buf(),
        };

        let target = temp.path().join("song.dfpwm");

        stage.finish(&wav, &target, &Err(TaskError::ExitCode(1)));

        assert!(!wav.exists());
        // A second delete only warns
        stage.finish(&wav, &target, &Ok(()));
    }

    #[test]
    fn test_encode_finish_discards_partial_target_on_failure() {
        let temp = TempDir::new().unwrap();
        let stage = EncodeStage {
            java: PathBuf::from("java"),
            payload: PathBuf::from("p.jar"),
            working_dir: temp.path().to_path_buf(),
        };
        let (good_wav, good_out) = (temp.path().join("good.wav"), temp.path().join("good.dfpwm"));
        let (bad_wav, bad_out) = (temp.path().join("bad.wav"), temp.path().join("bad.dfpwm"));
        for path in [&good_wav, &good_out, &bad_wav, &bad_out] {
            std::fs::write(path, b"data").unwrap();
        }

        stage.finish(&good_wav, &good_out, &Ok(()));
        stage.finish(&bad_wav, &bad_out, &Err(TaskError::ExitCode(2)));

        assert!(good_out.exists());
        assert!(!bad_out.exists());
        assert!(!good_wav.exists() && !bad_wav.exists());
    }

    #[test]
    fn test_transcode_finish_discards_partial_intermediate() {
        let temp = TempDir::new().unwrap();
        let stage = TranscodeStage {
            executable: PathBuf::from("ffmpeg"),
            input_root: temp.path().join("in"),
            working_dir: temp.path().to_path_buf(),
            policy: SanitizePolicy::Lowercase,
        };
        let input = temp.path().join("in/song.mp3");
        let kept = temp.path().join("kept.wav");
        let partial = temp.path().join("song.wav");
        std::fs::write(&kept, b"RIFF").unwrap();
        std::fs::write(&partial, b"RIF").unwrap();

        stage.finish(&input, &kept, &Ok(()));
        stage.finish(&input, &partial, &Err(TaskError::ExitCode(1)));
        // Nothing written at all is fine too
        stage.finish(&input, &partial, &Err(TaskError::Terminated));

        assert!(kept.exists());
        assert!(!partial.exists());
    }
}
