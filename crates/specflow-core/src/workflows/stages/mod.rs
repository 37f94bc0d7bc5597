use crate::engine::config::PipelineConfig;
use crate::engine::error::PipelineError;
use crate::engine::process::{self, ExitOutcome, Invocation};
use crate::engine::progress::{OutputLine, ProgressReporter};
use crate::engine::state::{ArtifactKind, PipelineRun, Stage};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

pub(crate) mod batch;
pub(crate) mod conformer;
pub(crate) mod quantum;
pub(crate) mod ranking;
pub(crate) mod structure;
pub(crate) mod trajectory;

/// Whether the pipeline proceeds after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StageFlow {
    Continue,
    Halt,
}

pub(crate) struct StageContext<'a> {
    pub config: &'a PipelineConfig,
    pub reporter: &'a ProgressReporter,
}

impl StageContext<'_> {
    /// Runs one sequential external step and enforces its exit-code policy.
    ///
    /// Every line goes to `on_line` first and then to the reporter's output stream.
    pub async fn run_tool<F>(
        &self,
        stage: Stage,
        invocation: Invocation,
        accepted: &[i32],
        log: &Path,
        mut on_line: F,
    ) -> Result<ExitOutcome, PipelineError>
    where
        F: FnMut(&OutputLine),
    {
        self.reporter
            .message(format!("Executing command: {}", invocation));
        let outcome = process::run(&invocation, |line| {
            on_line(&line);
            self.reporter.output(line);
        })
        .await
        .map_err(|source| PipelineError::ProcessLaunch { stage, source })?;

        if !outcome.is_accepted(accepted) {
            warn!(%stage, command = %invocation, %outcome, "External step rejected by exit-code policy.");
            return Err(PipelineError::ProcessExit {
                stage,
                command: invocation.to_string(),
                outcome,
                log: log.to_path_buf(),
            });
        }
        Ok(outcome)
    }
}

/// The artifact recorded earlier in this run, or else the one `discover` finds on disk.
pub(crate) fn resolve<F>(
    run: &PipelineRun,
    kind: ArtifactKind,
    discover: F,
) -> Result<PathBuf, PipelineError>
where
    F: FnOnce() -> Result<PathBuf, PipelineError>,
{
    match run.artifact(kind) {
        Some(_) => run.require(kind),
        None => discover(),
    }
}

/// Fails with a missing-artifact error unless `path` exists.
pub(crate) fn expect_file(
    stage: Stage,
    description: impl fmt::Display,
    path: PathBuf,
) -> Result<PathBuf, PipelineError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(PipelineError::MissingArtifact {
            stage,
            description: description.to_string(),
            path,
        })
    }
}
