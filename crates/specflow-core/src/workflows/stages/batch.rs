use super::{StageContext, resolve};
use crate::core::io::mopac::MopacJob;
use crate::core::io::traits::FormatWriter;
use crate::core::io::xyz::XyzFile;
use crate::engine::artifacts::{
    file_name, file_stem, files_matching, find_unique, has_extension, move_into,
};
use crate::engine::config::ExternalTool;
use crate::engine::error::PipelineError;
use crate::engine::pool::WorkerPool;
use crate::engine::process::{self, Invocation};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{ArtifactKind, ConformerJob, JobStatus, PipelineRun, Stage};
use std::fs;
use std::future::Future;
use std::path::Path;
use tracing::{debug, info, warn};

const STAGE: Stage = Stage::BatchOptimize;
pub const RESULTS_DIR: &str = "MOPAC_Results";

/// Writes one MOPAC job per conformer frame and optimises them all under the pool limit.
pub(crate) async fn run(ctx: &StageContext<'_>, run: &mut PipelineRun) -> Result<(), PipelineError> {
    let dir = run.working_dir().to_path_buf();
    let project_prefix = format!("{}-", run.project_name());
    let xyz = resolve(run, ArtifactKind::ConformerTrajectory, || {
        find_unique(STAGE, &dir, "conformer XYZ trajectory", |p| {
            has_extension(p, "xyz") && !file_name(p).starts_with(&project_prefix)
        })
    })?;
    let stem = file_stem(&xyz);

    // === Phase 1: Archive the force-field inputs ===
    let amber_files = [format!("{}.prmtop", stem), format!("{}.mdcrd", stem)];
    let moved = move_into(STAGE, &dir, &stem, |p| amber_files.contains(&file_name(p)))?;
    for path in moved {
        if has_extension(&path, "prmtop") {
            run.record(ArtifactKind::Prmtop, path);
        } else {
            run.record(ArtifactKind::Mdcrd, path);
        }
    }

    // === Phase 2: One job file per frame ===
    ctx.reporter.message("Starting MOPAC calculations...");
    let results = dir.join(RESULTS_DIR);
    fs::create_dir_all(&results).map_err(PipelineError::io(STAGE, &results))?;
    clear_previous_jobs(&results)?;
    let mut jobs = write_jobs(ctx, &xyz, &results)?;
    if jobs.is_empty() {
        return Err(PipelineError::MissingArtifact {
            stage: STAGE,
            description: "conformer frames".to_string(),
            path: xyz,
        });
    }
    ctx.reporter
        .message(format!("Read {} frames from {}", jobs.len(), xyz.display()));

    // === Phase 3: Bounded parallel optimisation ===
    let pool = WorkerPool::new(ctx.config.batch_concurrency);
    info!(jobs = jobs.len(), limit = pool.limit(), "Dispatching batch optimisation.");
    ctx.reporter.report(Progress::TaskStart {
        total_steps: jobs.len() as u64,
    });
    let outcomes = pool
        .run(
            jobs.iter()
                .map(|job| optimize(&ctx.config.mopac, ctx.reporter, job, &results)),
        )
        .await;
    ctx.reporter.report(Progress::TaskFinish);

    let mut failures = Vec::new();
    for (job, outcome) in jobs.iter_mut().zip(outcomes) {
        match outcome {
            Ok(()) => job.status = JobStatus::Succeeded,
            Err(e) => {
                warn!(frame = job.frame, error = %e, "Batch job failed.");
                job.status = JobStatus::Failed;
                failures.push((job.frame, e.to_string()));
            }
        }
    }

    let total = jobs.len();
    run.set_jobs(jobs);
    run.record(ArtifactKind::BatchDirectory, results);
    if !failures.is_empty() {
        return Err(PipelineError::BatchFailed {
            stage: STAGE,
            total,
            failures,
        });
    }
    ctx.reporter.message("MOPAC calculations completed");
    Ok(())
}

/// Removes `Frame_*.mop` and `Frame_*.out` left in `results` by an earlier batch.
fn clear_previous_jobs(results: &Path) -> Result<(), PipelineError> {
    let stale = files_matching(results, |p| {
        file_name(p).starts_with("Frame_") && (has_extension(p, "mop") || has_extension(p, "out"))
    })
    .map_err(PipelineError::io(STAGE, results))?;
    if !stale.is_empty() {
        debug!(count = stale.len(), dir = %results.display(), "Removing previous batch files.");
    }
    for path in stale {
        fs::remove_file(&path).map_err(PipelineError::io(STAGE, &path))?;
    }
    Ok(())
}

fn write_jobs(
    ctx: &StageContext<'_>,
    xyz: &Path,
    results: &Path,
) -> Result<Vec<ConformerJob>, PipelineError> {
    let frames = XyzFile::frames_from_path(xyz).map_err(PipelineError::io(STAGE, xyz))?;
    let writer = MopacJob::new(&ctx.config.mopac_header);

    let mut jobs = Vec::new();
    for (i, frame) in frames.enumerate() {
        let frame = frame.map_err(PipelineError::format(STAGE, xyz))?;
        let index = i + 1;
        let input = results.join(format!("Frame_{}.mop", index));
        writer
            .write_to_path(&frame, &input)
            .map_err(PipelineError::format(STAGE, &input))?;
        jobs.push(ConformerJob::new(
            index,
            input,
            results.join(format!("Frame_{}.out", index)),
        ));
    }
    Ok(jobs)
}

fn optimize(
    tool: &ExternalTool,
    reporter: &ProgressReporter,
    job: &ConformerJob,
    results: &Path,
) -> impl Future<Output = Result<(), String>> + Send + use<> {
    let invocation = Invocation::new(&tool.executable)
        .arg(file_name(&job.input))
        .current_dir(results);
    let accepted = tool.success_exit_codes.clone();
    let reporter = reporter.clone();
    let frame = job.frame;
    let output = job.output.clone();

    async move {
        reporter.message(format!("Executing command: {}", invocation));
        let result = process::run(&invocation, |line| reporter.output(line)).await;
        reporter.report(Progress::TaskIncrement);

        let outcome = result.map_err(|e| e.to_string())?;
        if !outcome.is_accepted(&accepted) {
            reporter.message(format!(
                "MOPAC calculation failed for Frame {}. {}",
                frame, outcome
            ));
            return Err(format!("MOPAC finished with {}", outcome));
        }
        if !output.is_file() {
            return Err(format!("no output written to {}", output.display()));
        }
        reporter.message(format!("MOPAC calculation completed for Frame {}.", frame));
        Ok(())
    }
}
