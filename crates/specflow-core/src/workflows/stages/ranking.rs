use super::StageContext;
use super::batch::RESULTS_DIR;
use crate::core::io::mopac::{MopacJobFile, MopacOutputFile, frame_index_from_path};
use crate::core::io::traits::FormatReader;
use crate::core::io::xyz::{COMMENT_PREFIX, XyzFile};
use crate::core::models::energy::{EnergyRecord, lowest_energy};
use crate::engine::artifacts::{file_name, files_matching, has_extension};
use crate::engine::error::PipelineError;
use crate::engine::state::{ArtifactKind, PipelineRun, Stage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const STAGE: Stage = Stage::EnergyRank;

/// Picks the conformer with the lowest heat of formation and writes it as `{project}-minimize.xyz`.
pub(crate) async fn run(ctx: &StageContext<'_>, run: &mut PipelineRun) -> Result<(), PipelineError> {
    let results = match run.artifact(ArtifactKind::BatchDirectory) {
        Some(path) => path.to_path_buf(),
        None => run.working_dir().join(RESULTS_DIR),
    };
    if !results.is_dir() {
        return Err(PipelineError::MissingArtifact {
            stage: STAGE,
            description: ArtifactKind::BatchDirectory.to_string(),
            path: results,
        });
    }

    ctx.reporter
        .message("Starting analysis of MOPAC output files...");
    let outputs = if run.jobs().is_empty() {
        scan_outputs(&results)?
    } else {
        run.jobs()
            .iter()
            .map(|job| (job.frame, job.output.clone()))
            .collect()
    };
    let records = read_energies(ctx, outputs)?;
    let Some(best) = lowest_energy(&records) else {
        return Err(PipelineError::MissingArtifact {
            stage: STAGE,
            description: "MOPAC output files".to_string(),
            path: results,
        });
    };
    info!(frame = best.frame, energy = best.energy, "Lowest-energy conformer selected.");
    ctx.reporter.message(format!(
        "Lowest energy: Frame_{} at {} {}",
        best.frame, best.energy, best.unit
    ));

    let job = results.join(format!("Frame_{}.mop", best.frame));
    let minimized = run.project_file("-minimize.xyz");
    write_minimum(&job, &minimized, best.frame)?;
    ctx.reporter
        .message(format!("XYZ file saved to: {}", minimized.display()));

    run.set_minimum(best);
    run.record(ArtifactKind::BatchDirectory, results);
    run.record(ArtifactKind::MinimumStructure, minimized);
    Ok(())
}

/// Every `Frame_*.out` in `results`, for runs that start at this stage without a batch.
fn scan_outputs(results: &Path) -> Result<Vec<(usize, PathBuf)>, PipelineError> {
    let mut outputs: Vec<(usize, PathBuf)> = files_matching(results, |p| {
        has_extension(p, "out") && file_name(p).starts_with("Frame_")
    })
    .map_err(PipelineError::io(STAGE, results))?
    .into_iter()
    .map(|p| -> Result<_, PipelineError> {
        let frame = frame_index_from_path(&p).map_err(PipelineError::format(STAGE, &p))?;
        Ok((frame, p))
    })
    .collect::<Result<_, _>>()?;
    outputs.sort_by_key(|(frame, _)| *frame);
    Ok(outputs)
}

fn read_energies(
    ctx: &StageContext<'_>,
    mut outputs: Vec<(usize, PathBuf)>,
) -> Result<Vec<EnergyRecord>, PipelineError> {
    outputs.sort_by_key(|(frame, _)| *frame);
    ctx.reporter
        .message(format!("Found {} MOPAC output files", outputs.len()));

    let mut records = Vec::with_capacity(outputs.len());
    for (_, path) in outputs {
        let record = MopacOutputFile::read_record(&path).map_err(PipelineError::format(STAGE, &path))?;
        ctx.reporter.message(format!(
            "Processed {}, Energy: {} {}",
            file_name(&path),
            record.energy,
            record.unit
        ));
        records.push(record);
    }
    Ok(records)
}

fn write_minimum(job: &Path, target: &Path, frame: usize) -> Result<(), PipelineError> {
    let mut structure = MopacJobFile
        .read_from_path(job)
        .map_err(PipelineError::format(STAGE, job))?;
    structure.comment = format!("{},Frame_{}", COMMENT_PREFIX, frame);

    let file = File::create(target).map_err(PipelineError::io(STAGE, target))?;
    let mut writer = BufWriter::new(file);
    XyzFile::write_frame(&structure, &mut writer).map_err(PipelineError::format(STAGE, target))?;
    writer.flush().map_err(PipelineError::io(STAGE, target))
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::state::ConformerJob;
    use std::fs;
    use tempfile::tempdir;

    fn write_frame(results: &Path, frame: usize, energy: &str) {
        fs::write(
            results.join(format!("Frame_{}.mop", frame)),
            format!(
                "PM6-DH+ precise\nmolecule\nAll coordinates are Cartesian\nC   0.{f}0000000 1 0.00000000 1 0.00000000 1\nO   0.00000000 1 0.00000000 1 1.20000000 1\n",
                f = frame
            ),
        )
        .unwrap();
        fs::write(
            results.join(format!("Frame_{}.out", frame)),
            format!("          FINAL HEAT OF FORMATION = {} KCAL/MOL\n", energy),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn lowest_energy_frame_becomes_the_minimized_structure() {
        let dir = tempdir().unwrap();
        let results = dir.path().join(RESULTS_DIR);
        fs::create_dir(&results).unwrap();
        write_frame(&results, 1, "-40.2");
        write_frame(&results, 2, "-41.5");
        write_frame(&results, 3, "-39.9");

        let config = testing::build(dir.path(), "co");
        let reporter = ProgressReporter::new();
        let ctx = StageContext {
            config: &config,
            reporter: &reporter,
        };
        let mut state = PipelineRun::new(dir.path(), "co", STAGE);

        run(&ctx, &mut state).await.unwrap();

        let best = state.minimum().unwrap();
        assert_eq!(best.frame, 2);
        assert_eq!(best.energy, -41.5);
        let xyz = fs::read_to_string(dir.path().join("co-minimize.xyz")).unwrap();
        assert_eq!(
            xyz,
            "2\ngenerated by specflow,Frame_2\nC 0.200000 0.000000 0.000000\nO 0.000000 0.000000 1.200000\n"
        );
    }

    #[tokio::test]
    async fn output_without_energy_is_a_format_error_naming_the_file() {
        let dir = tempdir().unwrap();
        let results = dir.path().join(RESULTS_DIR);
        fs::create_dir(&results).unwrap();
        write_frame(&results, 1, "-40.2");
        fs::write(results.join("Frame_2.out"), "JOB ENDED ABNORMALLY\n").unwrap();

        let config = testing::build(dir.path(), "co");
        let reporter = ProgressReporter::new();
        let ctx = StageContext {
            config: &config,
            reporter: &reporter,
        };
        let mut state = PipelineRun::new(dir.path(), "co", STAGE);

        match run(&ctx, &mut state).await {
            Err(err @ PipelineError::Format { .. }) => {
                assert!(err.to_string().contains("Frame_2.out"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn only_outputs_of_the_batch_jobs_are_ranked() {
        let dir = tempdir().unwrap();
        let results = dir.path().join(RESULTS_DIR);
        fs::create_dir(&results).unwrap();
        write_frame(&results, 1, "-40.2");
        write_frame(&results, 2, "-41.5");
        write_frame(&results, 3, "-39.9");
        write_frame(&results, 7, "-99.0");

        let config = testing::build(dir.path(), "co");
        let reporter = ProgressReporter::new();
        let ctx = StageContext {
            config: &config,
            reporter: &reporter,
        };
        let mut state = PipelineRun::new(dir.path(), "co", Stage::BatchOptimize);
        state.set_jobs(
            (1..=3)
                .map(|i| {
                    ConformerJob::new(
                        i,
                        results.join(format!("Frame_{}.mop", i)),
                        results.join(format!("Frame_{}.out", i)),
                    )
                })
                .collect(),
        );

        run(&ctx, &mut state).await.unwrap();

        assert_eq!(state.minimum().map(|m| m.frame), Some(2));
        let xyz = fs::read_to_string(dir.path().join("co-minimize.xyz")).unwrap();
        assert!(xyz.starts_with("2\ngenerated by specflow,Frame_2\n"));
    }

    #[tokio::test]
    async fn empty_results_directory_is_missing_outputs() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(RESULTS_DIR)).unwrap();

        let config = testing::build(dir.path(), "co");
        let reporter = ProgressReporter::new();
        let ctx = StageContext {
            config: &config,
            reporter: &reporter,
        };
        let mut state = PipelineRun::new(dir.path(), "co", STAGE);

        assert!(matches!(
            run(&ctx, &mut state).await,
            Err(PipelineError::MissingArtifact { .. })
        ));
    }
}
