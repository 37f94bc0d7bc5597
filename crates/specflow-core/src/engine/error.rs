use super::config::ConfigError;
use super::process::{ExitOutcome, ProcessError};
use super::state::Stage;
use crate::core::io::error::FormatError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[{stage}] Missing {description}: {}", path.display())]
    MissingArtifact {
        stage: Stage,
        description: String,
        path: PathBuf,
    },

    #[error("[{stage}] Expected exactly one {description} in {}, found {}", dir.display(), candidates.len())]
    AmbiguousArtifact {
        stage: Stage,
        description: String,
        dir: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("[{stage}] Invalid content in {}: {source}", path.display())]
    Format {
        stage: Stage,
        path: PathBuf,
        source: FormatError,
    },

    #[error("[{stage}] {source}")]
    ProcessLaunch { stage: Stage, source: ProcessError },

    #[error("[{stage}] '{command}' failed with {outcome} (see {})", log.display())]
    ProcessExit {
        stage: Stage,
        command: String,
        outcome: ExitOutcome,
        log: PathBuf,
    },

    #[error("[{stage}] {} of {total} batch jobs failed: {}", failures.len(), summarize(failures))]
    BatchFailed {
        stage: Stage,
        total: usize,
        failures: Vec<(usize, String)>,
    },

    #[error("[{stage}] I/O error on {}: {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn io(stage: Stage, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            stage,
            path,
            source,
        }
    }

    pub fn format<E: Into<FormatError>>(
        stage: Stage,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(E) -> Self {
        let path = path.into();
        move |source| Self::Format {
            stage,
            path,
            source: source.into(),
        }
    }

    /// The stage the error was raised in, if it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::MissingArtifact { stage, .. }
            | Self::AmbiguousArtifact { stage, .. }
            | Self::Format { stage, .. }
            | Self::ProcessLaunch { stage, .. }
            | Self::ProcessExit { stage, .. }
            | Self::BatchFailed { stage, .. }
            | Self::Io { stage, .. } => Some(*stage),
            Self::Config(_) => None,
        }
    }
}

fn summarize(failures: &[(usize, String)]) -> String {
    const SHOWN: usize = 3;
    let mut text = failures
        .iter()
        .take(SHOWN)
        .map(|(frame, reason)| format!("frame {}: {}", frame, reason))
        .collect::<Vec<_>>()
        .join("; ");
    if failures.len() > SHOWN {
        text.push_str(&format!("; and {} more", failures.len() - SHOWN));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::mopac::MopacError;

    #[test]
    fn format_error_names_stage_and_file() {
        let err = PipelineError::format(Stage::EnergyRank, "/run/MOPAC_Results/Frame_4.out")(
            MopacError::MissingEnergyMarker,
        );
        let text = err.to_string();
        assert!(text.starts_with("[energy-rank]"));
        assert!(text.contains("Frame_4.out"));
        assert!(text.contains("FINAL HEAT OF FORMATION"));
        assert_eq!(err.stage(), Some(Stage::EnergyRank));
    }

    #[test]
    fn batch_failure_lists_first_failures() {
        let err = PipelineError::BatchFailed {
            stage: Stage::BatchOptimize,
            total: 10,
            failures: (1..=5).map(|i| (i, "exit code 1".to_string())).collect(),
        };
        let text = err.to_string();
        assert!(text.contains("5 of 10 batch jobs failed"));
        assert!(text.contains("frame 3: exit code 1"));
        assert!(!text.contains("frame 4:"));
        assert!(text.ends_with("and 2 more"));
    }
}
