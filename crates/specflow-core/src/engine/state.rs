use crate::core::models::energy::EnergyRecord;
use crate::engine::error::PipelineError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    StructureBuild,
    ConformerSearch,
    TrajectoryExtract,
    BatchOptimize,
    EnergyRank,
    GroundState,
    ExcitedState,
    ExcitedStateRefine,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::StructureBuild,
        Stage::ConformerSearch,
        Stage::TrajectoryExtract,
        Stage::BatchOptimize,
        Stage::EnergyRank,
        Stage::GroundState,
        Stage::ExcitedState,
        Stage::ExcitedStateRefine,
    ];

    /// The kebab-case name used on the command line and in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::StructureBuild => "structure-build",
            Self::ConformerSearch => "conformer-search",
            Self::TrajectoryExtract => "trajectory-extract",
            Self::BatchOptimize => "batch-optimize",
            Self::EnergyRank => "energy-rank",
            Self::GroundState => "ground-state",
            Self::ExcitedState => "excited-state",
            Self::ExcitedStateRefine => "excited-state-refine",
        }
    }

    /// `self` and every stage after it.
    pub fn remaining(self) -> impl Iterator<Item = Stage> {
        Self::ALL.into_iter().filter(move |s| *s >= self)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|s| s.name()).collect();
                format!("unknown stage '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Files the stages hand to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    Mol2,
    Prmtop,
    Mdcrd,
    ConformerTrajectory,
    BatchDirectory,
    MinimumStructure,
    GroundStateInput,
    GroundStateOutput,
    GroundStateStructure,
    ExcitedStateInput,
    ExcitedStateOutput,
    ExcitedStateStructure,
    RefineInput,
    RefineOutput,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Mol2 => "mol2 structure",
            Self::Prmtop => "AMBER topology",
            Self::Mdcrd => "AMBER trajectory",
            Self::ConformerTrajectory => "conformer XYZ trajectory",
            Self::BatchDirectory => "MOPAC results directory",
            Self::MinimumStructure => "minimum-energy structure",
            Self::GroundStateInput => "ground-state job",
            Self::GroundStateOutput => "ground-state output",
            Self::GroundStateStructure => "ground-state structure",
            Self::ExcitedStateInput => "excited-state job",
            Self::ExcitedStateOutput => "excited-state output",
            Self::ExcitedStateStructure => "excited-state structure",
            Self::RefineInput => "refinement job",
            Self::RefineOutput => "refinement output",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// One single-frame optimisation of the batch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformerJob {
    pub frame: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: JobStatus,
}

impl ConformerJob {
    pub fn new(frame: usize, input: PathBuf, output: PathBuf) -> Self {
        Self {
            frame,
            input,
            output,
            status: JobStatus::Pending,
        }
    }
}

/// Mutable state of one pipeline execution, owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    working_dir: PathBuf,
    project_name: String,
    stage: Stage,
    artifacts: BTreeMap<ArtifactKind, PathBuf>,
    jobs: Vec<ConformerJob>,
    minimum: Option<EnergyRecord>,
}

impl PipelineRun {
    pub fn new(working_dir: impl Into<PathBuf>, project_name: impl Into<String>, stage: Stage) -> Self {
        Self {
            working_dir: working_dir.into(),
            project_name: project_name.into(),
            stage,
            artifacts: BTreeMap::new(),
            jobs: Vec::new(),
            minimum: None,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// `{working_dir}/{project}{suffix}`.
    pub fn project_file(&self, suffix: &str) -> PathBuf {
        self.working_dir
            .join(format!("{}{}", self.project_name, suffix))
    }

    pub fn record(&mut self, kind: ArtifactKind, path: impl Into<PathBuf>) {
        self.artifacts.insert(kind, path.into());
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Path> {
        self.artifacts.get(&kind).map(PathBuf::as_path)
    }

    /// Looks up an artifact the current stage cannot proceed without.
    pub fn require(&self, kind: ArtifactKind) -> Result<PathBuf, PipelineError> {
        match self.artifacts.get(&kind) {
            Some(path) if path.exists() => Ok(path.clone()),
            Some(path) => Err(PipelineError::MissingArtifact {
                stage: self.stage,
                description: kind.to_string(),
                path: path.clone(),
            }),
            None => Err(PipelineError::MissingArtifact {
                stage: self.stage,
                description: kind.to_string(),
                path: self.working_dir.clone(),
            }),
        }
    }

    pub fn artifacts(&self) -> &BTreeMap<ArtifactKind, PathBuf> {
        &self.artifacts
    }

    pub fn jobs(&self) -> &[ConformerJob] {
        &self.jobs
    }

    pub fn set_jobs(&mut self, jobs: Vec<ConformerJob>) {
        self.jobs = jobs;
    }

    pub fn minimum(&self) -> Option<&EnergyRecord> {
        self.minimum.as_ref()
    }

    pub fn set_minimum(&mut self, record: EnergyRecord) {
        self.minimum = Some(record);
    }
}
