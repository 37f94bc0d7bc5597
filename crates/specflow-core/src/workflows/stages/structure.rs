use super::{StageContext, expect_file};
use crate::engine::artifacts::file_name;
use crate::engine::error::PipelineError;
use crate::engine::process::Invocation;
use crate::engine::state::{ArtifactKind, PipelineRun, Stage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const STAGE: Stage = Stage::StructureBuild;
const PLACEHOLDER_RESIDUE: &str = "UNL1";
const RESIDUE_WILDCARD: &str = "****";

/// Where the initial 3-D structure comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureInput {
    /// A MOL block on disk, converted to mol2 by the configured converter.
    MolBlock(PathBuf),
    /// A ready mol2 file, used as is.
    Mol2(PathBuf),
}

pub(crate) async fn run(
    ctx: &StageContext<'_>,
    run: &mut PipelineRun,
    input: Option<&StructureInput>,
) -> Result<(), PipelineError> {
    let input = input.ok_or_else(|| PipelineError::MissingArtifact {
        stage: STAGE,
        description: "structure input".to_string(),
        path: run.working_dir().to_path_buf(),
    })?;
    let mol2 = run.project_file(".mol2");

    match input {
        StructureInput::Mol2(source) => {
            let source = expect_file(STAGE, ArtifactKind::Mol2, source.clone())?;
            if !same_file(&source, &mol2) {
                fs::copy(&source, &mol2).map_err(PipelineError::io(STAGE, &mol2))?;
            }
            ctx.reporter
                .message(format!("Using structure {}", source.display()));
        }
        StructureInput::MolBlock(source) => {
            let source = expect_file(STAGE, "MOL block", source.clone())?;
            let mol = run.project_file(".mol");
            if !same_file(&source, &mol) {
                fs::copy(&source, &mol).map_err(PipelineError::io(STAGE, &mol))?;
            }
            convert(ctx, run.working_dir(), &mol, &mol2).await?;
            fs::remove_file(&mol).map_err(PipelineError::io(STAGE, &mol))?;
        }
    }

    info!(path = %mol2.display(), "Structure ready.");
    run.record(ArtifactKind::Mol2, mol2);
    Ok(())
}

async fn convert(
    ctx: &StageContext<'_>,
    dir: &Path,
    mol: &Path,
    mol2: &Path,
) -> Result<(), PipelineError> {
    let converter = &ctx.config.converter;
    let invocation = Invocation::new(&converter.executable)
        .args(["-i", "mol"])
        .arg(file_name(mol))
        .args(["-o", "mol2", "-O"])
        .arg(file_name(mol2))
        .current_dir(dir);
    ctx.run_tool(STAGE, invocation, &converter.success_exit_codes, mol, |_| {})
        .await?;

    let mol2 = expect_file(STAGE, ArtifactKind::Mol2, mol2.to_path_buf())?;
    let content = fs::read_to_string(&mol2).map_err(PipelineError::io(STAGE, &mol2))?;
    fs::write(&mol2, rename_placeholder_residue(&content))
        .map_err(PipelineError::io(STAGE, &mol2))?;
    ctx.reporter
        .message(format!("Converted structure written to {}", mol2.display()));
    Ok(())
}

/// Replaces the converter's placeholder residue name so the force-field tools assign their own.
fn rename_placeholder_residue(mol2: &str) -> String {
    mol2.replace(PLACEHOLDER_RESIDUE, RESIDUE_WILDCARD)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use crate::engine::progress::ProgressReporter;
    use tempfile::tempdir;

    const MOL2: &str = "@<TRIPOS>MOLECULE\nUNL1\n 1 0 0 0 0\n@<TRIPOS>ATOM\n 1 C1 0.0 0.0 0.0 C.3 1 UNL1 0.0\n";

    #[test]
    fn placeholder_residue_is_replaced_everywhere() {
        assert_eq!(
            rename_placeholder_residue(MOL2).matches(RESIDUE_WILDCARD).count(),
            2
        );
        assert!(!rename_placeholder_residue(MOL2).contains(PLACEHOLDER_RESIDUE));
    }

    #[tokio::test]
    async fn ready_mol2_is_copied_under_project_name() {
        let dir = tempdir().unwrap();
        let source_dir = tempdir().unwrap();
        let source = source_dir.path().join("input.mol2");
        fs::write(&source, MOL2).unwrap();

        let config = testing::build(dir.path(), "ethane");
        let reporter = ProgressReporter::new();
        let ctx = StageContext {
            config: &config,
            reporter: &reporter,
        };
        let mut state = PipelineRun::new(dir.path(), "ethane", STAGE);

        run(&ctx, &mut state, Some(&StructureInput::Mol2(source)))
            .await
            .unwrap();

        let mol2 = dir.path().join("ethane.mol2");
        assert_eq!(state.artifact(ArtifactKind::Mol2), Some(mol2.as_path()));
        assert_eq!(fs::read_to_string(mol2).unwrap(), MOL2);
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let dir = tempdir().unwrap();
        let config = testing::build(dir.path(), "ethane");
        let reporter = ProgressReporter::new();
        let ctx = StageContext {
            config: &config,
            reporter: &reporter,
        };
        let mut state = PipelineRun::new(dir.path(), "ethane", STAGE);

        let result = run(&ctx, &mut state, None).await;
        assert!(matches!(
            result,
            Err(PipelineError::MissingArtifact { stage: STAGE, .. })
        ));
    }
}
