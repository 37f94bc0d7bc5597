use super::{StageContext, expect_file, resolve};
use crate::engine::artifacts::{file_name, file_stem, find_unique, has_extension, move_into};
use crate::engine::config::{AmberConfig, ConfigError};
use crate::engine::error::PipelineError;
use crate::engine::process::Invocation;
use crate::engine::state::{ArtifactKind, PipelineRun, Stage};
use std::fs;
use std::path::Path;
use tracing::info;

const STAGE: Stage = Stage::ConformerSearch;
const TLEAP_SCRIPT: &str = "tleap_commands.txt";
const MD_INPUT: &str = "md.in";

/// Parameterises the molecule with AmberTools and samples conformers by high-temperature MD.
pub(crate) async fn run(ctx: &StageContext<'_>, run: &mut PipelineRun) -> Result<(), PipelineError> {
    let dir = run.working_dir().to_path_buf();
    let mol2 = resolve(run, ArtifactKind::Mol2, || {
        find_unique(STAGE, &dir, "mol2 structure", |p| has_extension(p, "mol2"))
    })?;
    let stem = file_stem(&mol2);
    let amber = &ctx.config.amber;
    let charge = ctx.config.orca_settings.net_charge;

    // === Step 1: Atom typing, charges and missing parameters ===
    run_shell(ctx, &dir, amber, &typing_command(&stem, charge)).await?;

    let prepin = format!("{}.prepin", stem);
    let frcmod = format!("{}.frcmod", stem);
    archive_except(&dir, &stem, &[&prepin, &frcmod])?;

    let prepin_path = expect_file(STAGE, "antechamber prep file", dir.join(&prepin))?;
    let content = fs::read_to_string(&prepin_path).map_err(PipelineError::io(STAGE, &prepin_path))?;
    fs::write(&prepin_path, normalize_prep(&content))
        .map_err(PipelineError::io(STAGE, &prepin_path))?;

    // === Step 2: Topology build and molecular dynamics ===
    let tleap_path = dir.join(TLEAP_SCRIPT);
    fs::write(&tleap_path, tleap_script(&stem)).map_err(PipelineError::io(STAGE, &tleap_path))?;
    let md_path = dir.join(MD_INPUT);
    fs::write(&md_path, md_input(amber)).map_err(PipelineError::io(STAGE, &md_path))?;

    run_shell(ctx, &dir, amber, &dynamics_command(&stem)).await?;

    let prmtop = format!("{}.prmtop", stem);
    let mdcrd = format!("{}.mdcrd", stem);
    archive_except(&dir, &stem, &[&prmtop, &mdcrd])?;

    let prmtop = expect_file(STAGE, ArtifactKind::Prmtop, dir.join(prmtop))?;
    let mdcrd = expect_file(STAGE, ArtifactKind::Mdcrd, dir.join(mdcrd))?;
    info!(prmtop = %prmtop.display(), mdcrd = %mdcrd.display(), "Conformer search finished.");
    run.record(ArtifactKind::Prmtop, prmtop);
    run.record(ArtifactKind::Mdcrd, mdcrd);
    Ok(())
}

fn typing_command(stem: &str, charge: i32) -> String {
    let file = |ext: &str| shell_quote(&format!("{}.{}", stem, ext));
    format!(
        "antechamber -i {mol2} -fi mol2 -o {prepin} -fo prepi -c bcc -s 2 -nc {c} && parmchk2 -i {prepin} -f prepi -o {frcmod}",
        mol2 = file("mol2"),
        prepin = file("prepin"),
        frcmod = file("frcmod"),
        c = charge
    )
}

fn dynamics_command(stem: &str) -> String {
    let file = |ext: &str| shell_quote(&format!("{}.{}", stem, ext));
    format!(
        "tleap -s -f leaprc.ff10 -f {t} && sander -O -i {m} -o md.out -p {prmtop} -c {inpcrd} -r md.rst -x {mdcrd}",
        t = TLEAP_SCRIPT,
        m = MD_INPUT,
        prmtop = file("prmtop"),
        inpcrd = file("inpcrd"),
        mdcrd = file("mdcrd")
    )
}

/// Single-quotes `word` for a POSIX shell unless it only has characters the shell leaves alone.
fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./+,:=@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// tleap splits arguments on whitespace; such names are double-quoted.
fn leap_word(word: String) -> String {
    if word.contains(char::is_whitespace) {
        format!("\"{}\"", word)
    } else {
        word
    }
}

async fn run_shell(
    ctx: &StageContext<'_>,
    dir: &Path,
    amber: &AmberConfig,
    command: &str,
) -> Result<(), PipelineError> {
    let (launcher, launcher_args) = amber
        .launcher
        .split_first()
        .ok_or(ConfigError::MissingParameter("amber.launcher"))?;
    let invocation = Invocation::new(launcher)
        .args(launcher_args)
        .arg(amber.shell_line(command))
        .current_dir(dir);
    ctx.run_tool(STAGE, invocation, &amber.success_exit_codes, dir, |_| {})
        .await?;
    Ok(())
}

/// Moves the stage's intermediates into `{stem}/`, leaving `keep` and configuration files.
fn archive_except(dir: &Path, stem: &str, keep: &[&str]) -> Result<(), PipelineError> {
    move_into(STAGE, dir, stem, |p| {
        let name = file_name(p);
        !keep.contains(&name.as_str()) && !has_extension(p, "toml")
    })?;
    Ok(())
}

/// Rewrites `***<whitespace>INT` residue headers to `INT` and normalises line endings.
fn normalize_prep(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(pos) = rest.find("***") {
        let after = &rest[pos + 3..];
        let trimmed = after.trim_start();
        if trimmed.len() < after.len() && trimmed.starts_with("INT") {
            out.push_str(&rest[..pos]);
            out.push_str("INT");
            rest = &trimmed[3..];
        } else {
            out.push_str(&rest[..pos + 1]);
            rest = &rest[pos + 1..];
        }
    }
    out.push_str(rest);
    out
}

fn tleap_script(stem: &str) -> String {
    let file = |ext: &str| leap_word(format!("{}.{}", stem, ext));
    format!(
        "source leaprc.gaff\n\
         loadamberprep {prepin}\n\
         loadamberparams {frcmod}\n\
         saveamberparm INT {prmtop} {inpcrd}\n\
         quit\n",
        prepin = file("prepin"),
        frcmod = file("frcmod"),
        prmtop = file("prmtop"),
        inpcrd = file("inpcrd")
    )
}

fn md_input(amber: &AmberConfig) -> String {
    format!(
        "High-temperature sampling: {steps} steps at {t}K\n\
         &cntrl\n\
         imin=0,nstlim={steps},dt=0.002,ntpr=50,ntwr=100,ntwx={every},ntc=2,\n\
         tempi={t},temp0={t},ntt=3,ntb=0,cut=12.0,gamma_ln=2.0,igb=0\n\
         ntxo=1, ! Write coordinate file in ASCII format\n\
         ioutfm=0, ! Write trajectory file in ASCII format\n\
         /\n",
        steps = amber.md_steps,
        t = amber.temperature,
        every = amber.snapshot_interval
    )
}
