use super::StructureInput;
use super::stages::{self, StageContext, StageFlow};
use crate::core::io::orca::OrcaJobKind;
use crate::engine::config::PipelineConfig;
use crate::engine::error::PipelineError;
use crate::engine::gate::DecisionProvider;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{PipelineRun, Stage};
use std::fs;
use tracing::{info, instrument};

/// How a pipeline run ended. Either way the run's artifacts stay on disk.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every stage through the excited-state refinement finished.
    Completed(PipelineRun),
    /// The frequency gate after `stage` was rejected.
    Halted { stage: Stage, run: PipelineRun },
}

impl PipelineOutcome {
    pub fn run(&self) -> &PipelineRun {
        match self {
            Self::Completed(run) | Self::Halted { run, .. } => run,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Where a run begins and what it starts from.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub from: Stage,
    /// Only read by the structure-build stage.
    pub structure: Option<StructureInput>,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            from: Stage::StructureBuild,
            structure: None,
        }
    }
}

/// Runs the stages from `request.from` to the end in `config.project_path`.
///
/// Stages started after the first discover their inputs from the artifacts recorded earlier
/// in the run; a run started mid-way discovers them in the working directory instead.
#[instrument(skip_all, name = "pipeline_workflow", fields(project = %config.project_name))]
pub async fn run<D: DecisionProvider>(
    config: &PipelineConfig,
    request: &RunRequest,
    decisions: &D,
    reporter: &ProgressReporter,
) -> Result<PipelineOutcome, PipelineError> {
    let dir = &config.project_path;
    fs::create_dir_all(dir).map_err(PipelineError::io(request.from, dir))?;
    info!(from = %request.from, dir = %dir.display(), "Starting pipeline.");

    let ctx = StageContext { config, reporter };
    let mut state = PipelineRun::new(dir, &config.project_name, request.from);

    for stage in request.from.remaining() {
        state.enter(stage);
        reporter.report(Progress::StageStart { stage });
        info!(%stage, "Stage started.");

        let flow = match stage {
            Stage::StructureBuild => {
                stages::structure::run(&ctx, &mut state, request.structure.as_ref()).await?;
                StageFlow::Continue
            }
            Stage::ConformerSearch => {
                stages::conformer::run(&ctx, &mut state).await?;
                StageFlow::Continue
            }
            Stage::TrajectoryExtract => {
                stages::trajectory::run(&ctx, &mut state).await?;
                StageFlow::Continue
            }
            Stage::BatchOptimize => {
                stages::batch::run(&ctx, &mut state).await?;
                StageFlow::Continue
            }
            Stage::EnergyRank => {
                stages::ranking::run(&ctx, &mut state).await?;
                StageFlow::Continue
            }
            Stage::GroundState => {
                stages::quantum::run(&ctx, &mut state, OrcaJobKind::GroundState, decisions).await?
            }
            Stage::ExcitedState => {
                stages::quantum::run(&ctx, &mut state, OrcaJobKind::ExcitedState, decisions).await?
            }
            Stage::ExcitedStateRefine => {
                stages::quantum::run(&ctx, &mut state, OrcaJobKind::ExcitedStateRefine, decisions)
                    .await?
            }
        };

        reporter.report(Progress::StageFinish { stage });
        if flow == StageFlow::Halt {
            info!(%stage, "Pipeline halted by decision.");
            return Ok(PipelineOutcome::Halted { stage, run: state });
        }
    }

    info!("Pipeline completed.");
    Ok(PipelineOutcome::Completed(state))
}
