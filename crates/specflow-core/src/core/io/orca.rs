use crate::core::io::traits::FormatWriter;
use crate::core::models::frame::LabeledFrame;
use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// Keyword inserted into the method line when a numerical frequency calculation is requested.
pub const FREQUENCY_KEYWORD: &str = "numfreq";

#[derive(Debug, Error)]
pub enum OrcaError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Cannot write a job without atoms")]
    EmptyFrame,
}

/// The three quantum-chemistry jobs of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrcaJobKind {
    GroundState,
    ExcitedState,
    ExcitedStateRefine,
}

impl OrcaJobKind {
    /// Artifact suffix used in file names (`{project}-{suffix}.inp`).
    pub fn file_suffix(self) -> &'static str {
        match self {
            Self::GroundState => "GroundState",
            Self::ExcitedState => "ExcitationState",
            Self::ExcitedStateRefine => "ExcitationState-CCSD",
        }
    }

    fn method_keywords(self) -> (&'static str, &'static str) {
        match self {
            Self::GroundState => ("r2SCAN-3c opt", "defgrid3 noautostart miniprint nopop"),
            Self::ExcitedState => (
                "PBE0 def2-SV(P) def2/J RIJCOSX tightSCF opt",
                "defgrid3 def2-SVP/C noautostart miniprint nopop",
            ),
            Self::ExcitedStateRefine => (
                "STEOM-DLPNO-CCSD RIJK def2-TZVP def2/JK def2-TZVP/C tightSCF",
                "noautostart nopop",
            ),
        }
    }

    /// The `!` line. The frequency keyword sits between the optimisation and grid keywords.
    pub fn method_line(self, frequencies: bool) -> String {
        let (head, tail) = self.method_keywords();
        if frequencies && self.supports_frequencies() {
            format!("! {} {} {}", head, FREQUENCY_KEYWORD, tail)
        } else {
            format!("! {} {}", head, tail)
        }
    }

    pub fn supports_frequencies(self) -> bool {
        !matches!(self, Self::ExcitedStateRefine)
    }

    fn excitation_block(self) -> Option<&'static str> {
        match self {
            Self::GroundState => None,
            Self::ExcitedState => Some("%tddft\nnroots 10\nTDA false\nend"),
            Self::ExcitedStateRefine => Some("%mdci\nnroots 5\nend"),
        }
    }
}

impl fmt::Display for OrcaJobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GroundState => write!(f, "ground state"),
            Self::ExcitedState => write!(f, "excited state"),
            Self::ExcitedStateRefine => write!(f, "excited state (STEOM-DLPNO-CCSD)"),
        }
    }
}

/// Resources and chemistry shared by every quantum-chemistry job of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct OrcaSettings {
    pub memory_mb: u64,
    pub core_count: usize,
    pub net_charge: i32,
    pub multiplicity: u32,
    pub solvent: String,
    pub frequencies: bool,
}

impl Default for OrcaSettings {
    fn default() -> Self {
        Self {
            memory_mb: 8192,
            core_count: 1,
            net_charge: 0,
            multiplicity: 1,
            solvent: "water".to_string(),
            frequencies: false,
        }
    }
}

/// Generates an ORCA input file for one job variant.
///
/// All variants share the resource block, the SMD solvent block and the atom block; they
/// differ in the method line and in the optional excitation block.
pub struct OrcaJob<'a> {
    kind: OrcaJobKind,
    settings: &'a OrcaSettings,
}

impl<'a> OrcaJob<'a> {
    pub fn new(kind: OrcaJobKind, settings: &'a OrcaSettings) -> Self {
        Self { kind, settings }
    }
}

impl FormatWriter for OrcaJob<'_> {
    type Input = LabeledFrame;
    type Error = OrcaError;

    fn write_to(&self, input: &Self::Input, writer: &mut impl Write) -> Result<(), Self::Error> {
        if input.atom_count() == 0 {
            return Err(OrcaError::EmptyFrame);
        }
        let s = self.settings;

        writeln!(writer, "{}", self.kind.method_line(s.frequencies))?;
        writeln!(writer, "%maxcore {}", s.memory_mb)?;
        writeln!(writer, "%pal nprocs {} end", s.core_count)?;
        writeln!(writer, "%cpcm\nsmd true\nSMDsolvent \"{}\"\nend", s.solvent)?;
        if let Some(block) = self.kind.excitation_block() {
            writeln!(writer, "{}", block)?;
        }
        writeln!(writer, "* xyz {} {}", s.net_charge, s.multiplicity)?;
        for (label, p) in input.atoms() {
            writeln!(writer, "{} {:.8} {:.8} {:.8}", label, p.x, p.y, p.z)?;
        }
        writeln!(writer, "*")?;
        Ok(())
    }
}
