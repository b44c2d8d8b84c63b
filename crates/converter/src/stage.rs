//! Stage runner module
//!
//! Runs one external process per input file with bounded concurrency. A
//! tokio Semaphore caps the number of live processes; each process is
//! spawned and waited on inside `spawn_blocking`, so a worker holds its
//! permit exactly as long as its process runs.
//!
//! Failures are isolated per file: a bad file is recorded in the
//! [`StageReport`] and logged, and its siblings carry on.

use crate::sanitize::SanitizeError;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Upper bound on simultaneously running external processes per stage
pub const MAX_CONCURRENT_PROCESSES: usize = 10;

/// Why a single file did not make it through a stage
#[derive(Debug, Error)]
pub enum TaskError {
    /// Tool exited with non-zero status
    #[error("exited with code {0}")]
    ExitCode(i32),

    /// Tool was terminated by a signal
    #[error("terminated by signal")]
    Terminated,

    /// Tool could not be started
    #[error("failed to start: {0}")]
    Spawn(io::Error),

    /// No usable output name could be derived
    #[error(transparent)]
    Rejected(#[from] SanitizeError),

    /// Another input in the same stage already writes this output
    #[error("output {} is already produced by another file", .0.display())]
    DuplicateOutput(PathBuf),

    /// The blocking worker panicked
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// One planned invocation: the output path and the command that writes it.
/// Owned by the worker that runs it.
#[derive(Debug)]
pub struct StageTask {
    pub output: PathBuf,
    pub command: Command,
}

/// A stage: how to turn one input file into a command, and what to do after.
pub trait StageSpec: Send + Sync + 'static {
    /// Target format name used in log lines (e.g. "WAV")
    fn name(&self) -> &str;

    /// Short, human-readable name for `input` in log lines
    fn label(&self, input: &Path) -> String;

    /// Plan the task for `input`. Errors reject the file without running anything.
    fn plan(&self, input: &Path) -> Result<StageTask, TaskError>;

    /// Called by the worker once the process for `input` has exited,
    /// whatever the outcome. `output` is the path the task was planned to
    /// write; on failure it may hold a partial file.
    fn finish(&self, _input: &Path, _output: &Path, _result: &Result<(), TaskError>) {}
}

/// Outcome for one input file
#[derive(Debug)]
pub struct TaskRecord {
    /// Planned output path; None if the file was rejected during planning
    pub output: Option<PathBuf>,
    pub result: Result<(), TaskError>,
}

/// Per-file outcomes of one stage, keyed by input path
#[derive(Debug, Default)]
pub struct StageReport {
    pub records: BTreeMap<PathBuf, TaskRecord>,
}

impl StageReport {
    /// Number of files converted
    pub fn succeeded(&self) -> usize {
        self.records.values().filter(|r| r.result.is_ok()).count()
    }

    /// Number of files rejected or failed
    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }

    /// Outputs of the files that converted
    pub fn outputs(&self) -> Vec<&Path> {
        self.records
            .values()
            .filter(|r| r.result.is_ok())
            .filter_map(|r| r.output.as_deref())
            .collect()
    }

    /// Outcome for `input`, if it was part of the stage
    pub fn result(&self, input: &Path) -> Option<&Result<(), TaskError>> {
        self.records.get(input).map(|r| &r.result)
    }
}

/// Run a planned command to completion, mapping its exit status
fn run_task(mut command: Command) -> Result<(), TaskError> {
    let status = command.status().map_err(TaskError::Spawn)?;

    if status.success() {
        Ok(())
    } else {
        match status.code() {
            Some(code) => Err(TaskError::ExitCode(code)),
            None => Err(TaskError::Terminated),
        }
    }
}

/// Bounded worker pool executing a [`StageSpec`] over a batch of files
pub struct StageRunner {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl Default for StageRunner {
    fn default() -> Self {
        Self::new(MAX_CONCURRENT_PROCESSES)
    }
}

impl StageRunner {
    /// Create a runner allowing `limit` concurrent processes (at least one)
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Get the number of available permits (idle process slots)
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `spec` over every input and wait for all workers to finish.
    ///
    /// Planning happens up front on the caller's task, so output collisions
    /// are caught before any process starts: the first input to claim an
    /// output path keeps it, later ones fail with
    /// [`TaskError::DuplicateOutput`].
    pub async fn run<S: StageSpec>(&self, spec: Arc<S>, inputs: Vec<PathBuf>) -> StageReport {
        let mut report = StageReport::default();
        let mut claimed = HashSet::new();
        let mut workers = JoinSet::new();

        for input in inputs {
            let label = spec.label(&input);

            let planned = match spec.plan(&input) {
                Ok(task) if !claimed.insert(task.output.clone()) => {
                    Err(TaskError::DuplicateOutput(task.output))
                }
                other => other,
            };

            let task = match planned {
                Ok(task) => task,
                Err(e) => {
                    error!("Unable to convert {} to {}: {}", label, spec.name(), e);
                    report.records.insert(
                        input,
                        TaskRecord {
                            output: None,
                            result: Err(e),
                        },
                    );
                    continue;
                }
            };

            let semaphore = self.semaphore.clone();
            let spec = spec.clone();
            workers.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("stage semaphore should not be closed");

                debug!("Working on \"{}\"", label);
                let StageTask { output, command } = task;
                let result = match tokio::task::spawn_blocking(move || run_task(command)).await {
                    Ok(result) => result,
                    Err(join_err) => Err(TaskError::Panicked(join_err.to_string())),
                };
                debug!("Finished Processing \"{}\"", label);

                if let Err(e) = &result {
                    error!("Unable to convert {} to {}: {}", label, spec.name(), e);
                }
                spec.finish(&input, &output, &result);

                (
                    input,
                    TaskRecord {
                        output: Some(output),
                        result,
                    },
                )
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((input, record)) => {
                    report.records.insert(input, record);
                }
                Err(e) => error!("{} worker aborted: {}", spec.name(), e),
            }
        }

        info!(
            "Done Converting Files to {} ({} succeeded, {} failed)",
            spec.name(),
            report.succeeded(),
            report.failed()
        );
        report
    }
}
