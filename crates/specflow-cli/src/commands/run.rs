use crate::cli::RunArgs;
use crate::config::{CliOverrides, PartialPipelineConfig};
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use specflow::engine::gate::{AutoDecision, ChannelDecision};
use specflow::engine::progress::ProgressReporter;
use specflow::engine::state::Stage;
use specflow::workflows::StructureInput;
use specflow::workflows::pipeline::{self, PipelineOutcome, RunRequest};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run(args: RunArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    info!("Starting 'run' command.");

    // === Phase 1: Configuration ===
    let config = PartialPipelineConfig::load(args.config.as_deref())?.merge_with_cli(
        &CliOverrides {
            project_name: args.project_name.as_deref(),
            project_path: args.project_path.as_deref(),
            jobs: args.jobs,
            set_values: &args.set_values,
        },
    )?;
    let request = build_request(&args)?;
    info!(
        project = %config.project_name,
        dir = %config.project_path.display(),
        from = %request.from,
        "Configuration resolved."
    );

    // === Phase 2: Reporting ===
    let handler = CliProgressHandler::new(ui_sender.clone());
    let mut reporter = ProgressReporter::with_callback(handler.progress_callback());
    if args.show_output {
        reporter = reporter.with_output(handler.output_callback());
    }

    // === Phase 3: Execution ===
    let outcome = match args.decision.answer() {
        Some(answer) => {
            pipeline::run(&config, &request, &AutoDecision(answer), &reporter).await?
        }
        None => {
            let (decisions, mut requests) = ChannelDecision::channel(1);
            let forwarder = tokio::spawn(async move {
                while let Some(request) = requests.recv().await {
                    if ui_sender.send(UiEvent::Confirm(request)).await.is_err() {
                        warn!("UI is not running; the decision is treated as rejected.");
                        break;
                    }
                }
            });

            let result = pipeline::run(&config, &request, &decisions, &reporter).await;
            drop(decisions);
            forwarder.await.map_err(|e| {
                CliError::Other(anyhow::anyhow!("Decision forwarder task failed: {}", e))
            })?;
            result?
        }
    };

    if handler.dropped_lines() > 0 {
        warn!(
            dropped = handler.dropped_lines(),
            "Some engine output lines were not shown because the display fell behind."
        );
    }

    // === Phase 4: Summary ===
    print!("{}", summary(&outcome));
    Ok(())
}

fn build_request(args: &RunArgs) -> Result<RunRequest> {
    let structure = match (&args.structure, &args.mol2) {
        (Some(path), _) => Some(StructureInput::MolBlock(absolute(path)?)),
        (_, Some(path)) => Some(StructureInput::Mol2(absolute(path)?)),
        _ => None,
    };

    match (&structure, args.from) {
        (None, Stage::StructureBuild) => {
            return Err(CliError::Argument(
                "Starting at 'structure-build' needs --structure or --mol2; use --from to resume at a later stage."
                    .to_string(),
            ));
        }
        (Some(_), from) if from != Stage::StructureBuild => {
            warn!(%from, "The structure input is ignored when starting at a later stage.");
        }
        _ => {}
    }

    Ok(RunRequest {
        from: args.from,
        structure,
    })
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(CliError::Io)
}

fn summary(outcome: &PipelineOutcome) -> String {
    let run = outcome.run();
    let mut text = String::new();

    match outcome {
        PipelineOutcome::Completed(_) => {
            let _ = writeln!(
                text,
                "Pipeline completed for '{}' in {}.",
                run.project_name(),
                run.working_dir().display()
            );
        }
        PipelineOutcome::Halted { stage, .. } => {
            let _ = writeln!(
                text,
                "Pipeline stopped after '{}': negative frequencies were not accepted.",
                stage
            );
        }
    }

    if let Some(minimum) = run.minimum() {
        let _ = writeln!(
            text,
            "Lowest-energy conformer: Frame {} ({} {})",
            minimum.frame, minimum.energy, minimum.unit
        );
    }
    if !run.artifacts().is_empty() {
        let _ = writeln!(text, "Artifacts:");
        for (kind, path) in run.artifacts() {
            let _ = writeln!(text, "  {:<26} {}", kind.to_string(), path.display());
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use specflow::core::models::energy::EnergyRecord;
    use specflow::engine::state::{ArtifactKind, PipelineRun};

    fn run_args(args: &[&str]) -> RunArgs {
        let mut argv = vec!["specflow", "run"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn first_stage_requires_a_structure() {
        let err = build_request(&run_args(&[])).unwrap_err();
        assert!(matches!(err, CliError::Argument(_)));
    }

    #[test]
    fn structure_paths_are_made_absolute() {
        let request = build_request(&run_args(&["--structure", "input.mol"])).unwrap();
        match request.structure {
            Some(StructureInput::MolBlock(path)) => {
                assert!(path.is_absolute());
                assert!(path.ends_with("input.mol"));
            }
            other => panic!("unexpected structure: {:?}", other),
        }
    }

    #[test]
    fn later_stages_need_no_structure() {
        let request = build_request(&run_args(&["--from", "energy-rank"])).unwrap();
        assert_eq!(request.from, Stage::EnergyRank);
        assert!(request.structure.is_none());
    }

    #[test]
    fn summary_lists_the_minimum_and_artifacts() {
        let mut run = PipelineRun::new("/work", "hf", Stage::EnergyRank);
        run.set_minimum(EnergyRecord::new(2, -41.5));
        run.record(ArtifactKind::MinimumStructure, "/work/hf/hf-minimize.xyz");

        let text = summary(&PipelineOutcome::Completed(run));

        assert!(text.starts_with("Pipeline completed for 'hf' in /work.\n"));
        assert!(text.contains("Lowest-energy conformer: Frame 2 (-41.5 KCAL/MOL)"));
        assert!(text.contains("minimum-energy structure"));
        assert!(text.contains("/work/hf/hf-minimize.xyz"));
    }

    #[test]
    fn halted_summary_names_the_stage() {
        let run = PipelineRun::new("/work", "hf", Stage::ExcitedState);
        let text = summary(&PipelineOutcome::Halted {
            stage: Stage::ExcitedState,
            run,
        });
        assert_eq!(
            text,
            "Pipeline stopped after 'excited-state': negative frequencies were not accepted.\n"
        );
    }
}
