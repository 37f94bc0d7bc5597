use super::{StageContext, resolve};
use crate::core::io::amber::{MdcrdFile, PrmtopFile};
use crate::core::io::traits::{FormatReader, FormatWriter};
use crate::core::io::xyz::XyzFile;
use crate::engine::artifacts::{file_stem, find_unique, has_extension};
use crate::engine::error::PipelineError;
use crate::engine::state::{ArtifactKind, PipelineRun, Stage};
use tracing::info;

const STAGE: Stage = Stage::TrajectoryExtract;

/// Converts the AMBER topology/trajectory pair into one multi-frame XYZ file.
pub(crate) async fn run(ctx: &StageContext<'_>, run: &mut PipelineRun) -> Result<(), PipelineError> {
    let dir = run.working_dir().to_path_buf();
    let prmtop = resolve(run, ArtifactKind::Prmtop, || {
        find_unique(STAGE, &dir, "AMBER topology", |p| has_extension(p, "prmtop"))
    })?;
    let mdcrd = resolve(run, ArtifactKind::Mdcrd, || {
        find_unique(STAGE, &dir, "AMBER trajectory", |p| has_extension(p, "mdcrd"))
    })?;

    ctx.reporter.message("Start processing files...");
    let topology = PrmtopFile
        .read_from_path(&prmtop)
        .map_err(PipelineError::format(STAGE, &prmtop))?;
    ctx.reporter.message(format!(
        "Read {} atoms from {}",
        topology.atom_count(),
        prmtop.display()
    ));

    let trajectory = MdcrdFile::new(&topology)
        .with_title_prefix(&ctx.config.amber.title_prefix)
        .read_from_path(&mdcrd)
        .map_err(PipelineError::format(STAGE, &mdcrd))?;
    ctx.reporter.message(format!(
        "Read {} frames from {}",
        trajectory.frame_count(),
        mdcrd.display()
    ));

    let xyz = dir.join(format!("{}.xyz", file_stem(&prmtop)));
    XyzFile
        .write_to_path(&trajectory, &xyz)
        .map_err(PipelineError::format(STAGE, &xyz))?;
    ctx.reporter
        .message(format!("XYZ file generated: {}", xyz.display()));
    info!(frames = trajectory.frame_count(), path = %xyz.display(), "Conformer trajectory written.");

    run.record(ArtifactKind::Prmtop, prmtop);
    run.record(ArtifactKind::Mdcrd, mdcrd);
    run.record(ArtifactKind::ConformerTrajectory, xyz);
    Ok(())
}
