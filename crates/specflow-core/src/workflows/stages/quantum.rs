use super::{StageContext, StageFlow, expect_file, resolve};
use crate::core::io::frequencies::FrequencySection;
use crate::core::io::orca::{OrcaJob, OrcaJobKind};
use crate::core::io::traits::{FormatReader, FormatWriter};
use crate::core::io::xyz::XyzFile;
use crate::engine::artifacts::{file_name, has_extension, move_into};
use crate::engine::error::PipelineError;
use crate::engine::gate::{DecisionProvider, FrequencyGate, GateState};
use crate::engine::process::Invocation;
use crate::engine::state::{ArtifactKind, PipelineRun, Stage};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Artifact wiring for one quantum-chemistry job variant.
struct JobPlan {
    stage: Stage,
    source: ArtifactKind,
    source_suffix: &'static str,
    input: ArtifactKind,
    output: ArtifactKind,
    structure: Option<ArtifactKind>,
    frequencies: bool,
}

impl JobPlan {
    fn for_kind(ctx: &StageContext<'_>, kind: OrcaJobKind) -> Self {
        match kind {
            OrcaJobKind::GroundState => Self {
                stage: Stage::GroundState,
                source: ArtifactKind::MinimumStructure,
                source_suffix: "-minimize.xyz",
                input: ArtifactKind::GroundStateInput,
                output: ArtifactKind::GroundStateOutput,
                structure: Some(ArtifactKind::GroundStateStructure),
                frequencies: ctx.config.ground_state_frequencies,
            },
            OrcaJobKind::ExcitedState => Self {
                stage: Stage::ExcitedState,
                source: ArtifactKind::GroundStateStructure,
                source_suffix: "-GroundState.xyz",
                input: ArtifactKind::ExcitedStateInput,
                output: ArtifactKind::ExcitedStateOutput,
                structure: Some(ArtifactKind::ExcitedStateStructure),
                frequencies: ctx.config.excited_state_frequencies,
            },
            OrcaJobKind::ExcitedStateRefine => Self {
                stage: Stage::ExcitedStateRefine,
                source: ArtifactKind::ExcitedStateStructure,
                source_suffix: "-ExcitationState.xyz",
                input: ArtifactKind::RefineInput,
                output: ArtifactKind::RefineOutput,
                structure: None,
                frequencies: false,
            },
        }
    }
}

/// Runs one ORCA job: writes its input from the previous structure, captures the engine's
/// output, passes the spectrum through the frequency gate and archives the job's scratch
/// files into `{project}-{suffix}/`.
///
/// Returns [`StageFlow::Halt`] when the gate is rejected; nothing is archived in that case.
pub(crate) async fn run<D: DecisionProvider>(
    ctx: &StageContext<'_>,
    run: &mut PipelineRun,
    kind: OrcaJobKind,
    decisions: &D,
) -> Result<StageFlow, PipelineError> {
    let plan = JobPlan::for_kind(ctx, kind);
    let stage = plan.stage;
    let dir = run.working_dir().to_path_buf();
    let suffix = kind.file_suffix();

    ctx.reporter
        .message(format!("Starting ORCA {} calculation process...", kind));

    // === Phase 1: Input generation ===
    let source = resolve(run, plan.source, || {
        expect_file(stage, plan.source, run.project_file(plan.source_suffix))
    })?;
    let structure = XyzFile::read_first_frame(&source).map_err(PipelineError::format(stage, &source))?;
    if kind == OrcaJobKind::GroundState {
        stash_structures(ctx, run)?;
    }

    let mut settings = ctx.config.orca_settings.clone();
    settings.frequencies = plan.frequencies && kind.supports_frequencies();
    let input = run.project_file(&format!("-{}.inp", suffix));
    OrcaJob::new(kind, &settings)
        .write_to_path(&structure, &input)
        .map_err(PipelineError::format(stage, &input))?;
    ctx.reporter
        .message(format!("ORCA input file saved to: {}", input.display()));

    // === Phase 2: Engine run with output capture ===
    let output = run.project_file(&format!("-{}.out", suffix));
    let tool = &ctx.config.orca;
    let invocation = Invocation::new(&tool.executable)
        .arg(file_name(&input))
        .current_dir(&dir);
    capture(ctx, stage, invocation, &tool.success_exit_codes, &output).await?;
    ctx.reporter.message(format!(
        "ORCA calculation completed, output file saved to: {}",
        output.display()
    ));
    run.record(plan.output, output.clone());

    if let Some(structure_kind) = plan.structure {
        let optimized = expect_file(stage, structure_kind, run.project_file(&format!("-{}.xyz", suffix)))?;
        run.record(structure_kind, optimized);
    }

    // === Phase 3: Frequency gate ===
    if settings.frequencies {
        let state = check_frequencies(ctx, stage, &output, decisions).await?;
        if !state.may_continue() {
            info!(%stage, "Run halted at the frequency gate.");
            ctx.reporter
                .message("Processing stopped at the user's request.");
            run.record(plan.input, input);
            return Ok(StageFlow::Halt);
        }
    }

    // === Phase 4: Archive scratch files ===
    let keep = [format!("{}-{}.xyz", run.project_name(), suffix), file_name(&output)];
    let archive = format!("{}-{}", run.project_name(), suffix);
    ctx.reporter
        .message(format!("Starting to move files to {}...", archive));
    let moved = move_into(stage, &dir, &archive, |p| {
        let name = file_name(p);
        belongs_to_job(&name, &archive) && !keep.contains(&name)
    })?;
    let archived_input = moved
        .into_iter()
        .find(|p| has_extension(p, "inp"))
        .unwrap_or(input);
    run.record(plan.input, archived_input);

    ctx.reporter
        .message(format!("ORCA {} calculation process completed.", kind));
    Ok(StageFlow::Continue)
}

/// `{project}-{suffix}` followed by `.` or `_`, so sibling jobs sharing a prefix stay apart.
fn belongs_to_job(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('_'))
}

/// Clears every XYZ file out of the working directory before the quantum jobs start writing
/// their own, keeping the recorded artifacts pointed at the moved files.
fn stash_structures(ctx: &StageContext<'_>, run: &mut PipelineRun) -> Result<(), PipelineError> {
    let dir = run.working_dir().to_path_buf();
    let project = run.project_name().to_string();
    let moved = move_into(Stage::GroundState, &dir, &project, |p| has_extension(p, "xyz"))?;
    if moved.is_empty() {
        return Ok(());
    }

    let relocated: Vec<(ArtifactKind, PathBuf)> = run
        .artifacts()
        .iter()
        .filter_map(|(kind, path)| {
            moved
                .iter()
                .find(|m| m.file_name() == path.file_name() && path.parent() == Some(dir.as_path()))
                .map(|m| (*kind, m.clone()))
        })
        .collect();
    for (kind, path) in relocated {
        run.record(kind, path);
    }
    ctx.reporter.message(format!(
        "Moved {} structure files to {}",
        moved.len(),
        dir.join(&project).display()
    ));
    Ok(())
}

/// Runs the engine and writes every output line to `log`, stderr lines prefixed `Error: `.
async fn capture(
    ctx: &StageContext<'_>,
    stage: Stage,
    invocation: Invocation,
    accepted: &[i32],
    log: &Path,
) -> Result<(), PipelineError> {
    let file = File::create(log).map_err(PipelineError::io(stage, log))?;
    let mut writer = BufWriter::new(file);
    let mut write_error: Option<io::Error> = None;

    let result = ctx
        .run_tool(stage, invocation, accepted, log, |line| {
            if write_error.is_none() {
                if let Err(e) = writeln!(writer, "{}", line) {
                    write_error = Some(e);
                }
            }
        })
        .await;

    let flushed = writer.flush();
    result?;
    if let Some(e) = write_error {
        return Err(PipelineError::io(stage, log)(e));
    }
    flushed.map_err(PipelineError::io(stage, log))
}

async fn check_frequencies<D: DecisionProvider>(
    ctx: &StageContext<'_>,
    stage: Stage,
    output: &Path,
    decisions: &D,
) -> Result<GateState, PipelineError> {
    ctx.reporter.message("Checking vibrational frequencies...");
    let report = FrequencySection
        .read_from_path(output)
        .map_err(PipelineError::format(stage, output))?;

    let state = FrequencyGate::check(&report, decisions).await;
    match &state {
        GateState::Clean => ctx
            .reporter
            .message("No negative frequencies found. Continuing processing."),
        GateState::Approved => ctx
            .reporter
            .message("Negative frequencies accepted. Continuing processing."),
        GateState::Rejected => {
            warn!(%stage, negatives = report.negative_count(), "Negative frequencies rejected.")
        }
        GateState::Evaluating | GateState::Flagged { .. } => {}
    }
    Ok(state)
}
