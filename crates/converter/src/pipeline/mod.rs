//! Pipeline orchestrator
//!
//! Sequences one conversion run:
//!
//! 1. `Init`: preflight checks, probe the payload, resolve the transcoder
//! 2. `StageOneRunning`: every file under the input root -> intermediate WAV
//! 3. `StageTwoPrep`: extract the encoder payload
//! 4. `StageTwoRunning`: every WAV in the working directory -> DFPWM
//! 5. `Cleanup`: delete the extracted payload after a settle delay
//! 6. `Done`
//!
//! Stage 2 starts only after every stage 1 worker has joined. Only
//! provisioning and preflight failures abort a run; per-file failures just
//! shrink the output.

pub mod stages;

pub use stages::{EncodeStage, TranscodeStage};

use crate::config::Config;
use crate::scan::{discover_inputs, discover_intermediates};
use crate::encode::INTERMEDIATE_EXTENSION;
use crate::stage::{StageReport, StageRunner};
use crate::startup::{check_java_available, detect_transcoder_version, StartupError};
use crate::tools::{
    BundledAssets, FfbinariesFetcher, PayloadExtractor, PayloadSource, ProvisionError,
    ReleaseFetcher, ToolHandle, TranscoderProvisioner,
};
use crate::workdir::{WorkdirError, WorkingDirectory};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for a pipeline run. Every variant is fatal.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required tool could not be provisioned
    #[error("Tool provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    /// Preflight check failed
    #[error("Startup check failed: {0}")]
    Startup(#[from] StartupError),

    /// Working directory could not be created
    #[error(transparent)]
    Workdir(#[from] WorkdirError),

    /// Input directory could not be prepared
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking preflight task panicked
    #[error("Preflight task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Position in the run's linear state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    StageOneRunning,
    StageTwoPrep,
    StageTwoRunning,
    Cleanup,
    Done,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Init => "init",
            PipelineState::StageOneRunning => "stage_one_running",
            PipelineState::StageTwoPrep => "stage_two_prep",
            PipelineState::StageTwoRunning => "stage_two_running",
            PipelineState::Cleanup => "cleanup",
            PipelineState::Done => "done",
        }
    }
}

/// What a completed run produced
#[derive(Debug)]
pub struct RunSummary {
    /// Directory holding the final files
    pub working_dir: PathBuf,
    pub stage_one: StageReport,
    pub stage_two: StageReport,
}

impl RunSummary {
    /// Number of target-format files produced
    pub fn converted(&self) -> usize {
        self.stage_two.succeeded()
    }
}

/// A configured conversion pipeline
pub struct Pipeline {
    config: Config,
    fetcher: Arc<dyn ReleaseFetcher>,
    payloads: Arc<dyn PayloadSource>,
    runner: StageRunner,
    temp_dir: PathBuf,
    skip_checks: bool,
}

impl Pipeline {
    /// Pipeline using the configured release index and the bundled payload
    pub fn new(config: Config) -> Self {
        let fetcher = Arc::new(FfbinariesFetcher::new(
            config.transcoder.release_index_url.clone(),
            config.transcoder.platform.clone(),
            config.transcoder.name_pattern.clone(),
        ));
        Self::with_sources(config, fetcher, Arc::new(BundledAssets))
    }

    /// Pipeline with explicit tool sources
    pub fn with_sources(
        config: Config,
        fetcher: Arc<dyn ReleaseFetcher>,
        payloads: Arc<dyn PayloadSource>,
    ) -> Self {
        Self {
            config,
            fetcher,
            payloads,
            runner: StageRunner::default(),
            temp_dir: std::env::temp_dir(),
            skip_checks: false,
        }
    }

    /// Directory the payload is extracted into (default: the OS temp dir)
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    /// Skip the Java runtime check
    pub fn skip_checks(mut self, skip: bool) -> Self {
        self.skip_checks = skip;
        self
    }

    fn enter(&self, state: PipelineState) {
        debug!("Pipeline state: {}", state.as_str());
    }

    /// Run both stages over the configured input directory
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let paths = &self.config.paths;

        self.enter(PipelineState::Init);
        if !self.skip_checks {
            let java = self.config.encoder.java.clone();
            tokio::task::spawn_blocking(move || check_java_available(&java)).await??;
        }

        // Payload first: a build without one must not download anything
        let extractor = PayloadExtractor::new(
            self.payloads.clone(),
            self.config.encoder.payload_suffix.clone(),
            self.temp_dir.clone(),
        );
        let payload_name = extractor.probe()?;
        debug!("Encoder payload: {}", payload_name);

        let transcoder = TranscoderProvisioner::new(
            paths.tools_dir.clone(),
            self.config.transcoder.name_pattern.clone(),
            self.fetcher.clone(),
        )
        .resolve()
        .await?;
        self.log_transcoder_version(&transcoder).await;

        std::fs::create_dir_all(&paths.input_dir)?;
        let input_root = std::fs::canonicalize(&paths.input_dir)?;
        let workdir = WorkingDirectory::create(&paths.output_dir)?;
        info!("Writing output to {}", workdir.path().display());

        self.enter(PipelineState::StageOneRunning);
        let inputs = discover_inputs(&input_root);
        info!("Converting {} files...", inputs.len());
        let stage_one = self
            .runner
            .run(
                Arc::new(TranscodeStage {
                    executable: transcoder.path().to_path_buf(),
                    input_root,
                    working_dir: workdir.path().to_path_buf(),
                    policy: self.config.sanitize.policy,
                }),
                inputs,
            )
            .await;

        self.enter(PipelineState::StageTwoPrep);
        let payload = tokio::task::spawn_blocking(move || extractor.extract())
            .await
            .map_err(ProvisionError::from)??;

        self.enter(PipelineState::StageTwoRunning);
        let intermediates = discover_intermediates(workdir.path(), INTERMEDIATE_EXTENSION);
        let stage_two = self
            .runner
            .run(
                Arc::new(EncodeStage {
                    java: self.config.encoder.java.clone(),
                    payload: payload.path().to_path_buf(),
                    working_dir: workdir.path().to_path_buf(),
                }),
                intermediates,
            )
            .await;

        self.enter(PipelineState::Cleanup);
        self.release_payload(payload).await;

        self.enter(PipelineState::Done);
        info!(
            "Converted {} of {} files into {}",
            stage_two.succeeded(),
            stage_one.records.len(),
            workdir.path().display()
        );

        Ok(RunSummary {
            working_dir: workdir.path().to_path_buf(),
            stage_one,
            stage_two,
        })
    }

    async fn log_transcoder_version(&self, transcoder: &ToolHandle) {
        let path = transcoder.path().to_path_buf();
        let version = tokio::task::spawn_blocking(move || detect_transcoder_version(&path))
            .await
            .ok()
            .flatten();
        match version {
            Some(v) => info!("Using transcoder {} ({})", v, transcoder.path().display()),
            None => info!("Using transcoder {}", transcoder.path().display()),
        }
    }

    /// Every encoder process has exited by now; the settle delay covers
    /// platforms that release file handles after process exit.
    async fn release_payload(&self, payload: ToolHandle) {
        tokio::time::sleep(Duration::from_millis(self.config.cleanup.settle_delay_ms)).await;
        let path = payload.path().to_path_buf();
        if let Err(e) = payload.release() {
            warn!("Unable to delete {}: {}", path.display(), e);
        }
    }
}
