use crate::core::io::amber::DEFAULT_TITLE_PREFIX;
use crate::core::io::mopac::MopacHeader;
use crate::core::io::orca::OrcaSettings;
use crate::engine::process::ExitOutcome;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// An external program and the exit codes that count as success for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub executable: PathBuf,
    pub success_exit_codes: Vec<i32>,
}

impl ExternalTool {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            success_exit_codes: vec![0],
        }
    }

    pub fn with_success_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.success_exit_codes = codes;
        self
    }

    pub fn accepts(&self, outcome: &ExitOutcome) -> bool {
        outcome.is_accepted(&self.success_exit_codes)
    }
}

/// Settings for the AmberTools conformer search.
///
/// The tools run as shell command lines through `launcher` (for example `bash -lc`), with
/// `setup` prepended when the toolchain needs an environment activated first.
#[derive(Debug, Clone, PartialEq)]
pub struct AmberConfig {
    pub launcher: Vec<String>,
    pub setup: Option<String>,
    pub success_exit_codes: Vec<i32>,
    pub md_steps: u64,
    pub temperature: f64,
    pub snapshot_interval: u64,
    pub title_prefix: String,
}

impl Default for AmberConfig {
    fn default() -> Self {
        Self {
            launcher: vec!["bash".to_string(), "-lc".to_string()],
            setup: None,
            success_exit_codes: vec![0],
            md_steps: 500_000,
            temperature: 1000.0,
            snapshot_interval: 5000,
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
        }
    }
}

impl AmberConfig {
    /// Prefixes `command` with the setup step, if any.
    pub fn shell_line(&self, command: &str) -> String {
        match self.setup.as_deref().map(str::trim) {
            Some(setup) if !setup.is_empty() => format!("{} && {}", setup, command),
            _ => command.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub project_name: String,
    pub project_path: PathBuf,
    pub converter: ExternalTool,
    pub amber: AmberConfig,
    pub mopac: ExternalTool,
    pub mopac_header: MopacHeader,
    pub orca: ExternalTool,
    pub orca_settings: OrcaSettings,
    pub ground_state_frequencies: bool,
    pub excited_state_frequencies: bool,
    pub batch_concurrency: usize,
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    project_name: Option<String>,
    project_path: Option<PathBuf>,
    converter: Option<ExternalTool>,
    amber: Option<AmberConfig>,
    mopac: Option<ExternalTool>,
    mopac_header: Option<MopacHeader>,
    orca: Option<ExternalTool>,
    memory_mb: Option<u64>,
    core_count: Option<usize>,
    net_charge: Option<i32>,
    solvent: Option<String>,
    ground_state_frequencies: Option<bool>,
    excited_state_frequencies: Option<bool>,
    batch_concurrency: Option<usize>,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }
    pub fn project_path(mut self, path: PathBuf) -> Self {
        self.project_path = Some(path);
        self
    }
    pub fn converter(mut self, tool: ExternalTool) -> Self {
        self.converter = Some(tool);
        self
    }
    pub fn amber(mut self, amber: AmberConfig) -> Self {
        self.amber = Some(amber);
        self
    }
    pub fn mopac(mut self, tool: ExternalTool) -> Self {
        self.mopac = Some(tool);
        self
    }
    pub fn mopac_header(mut self, header: MopacHeader) -> Self {
        self.mopac_header = Some(header);
        self
    }
    pub fn orca(mut self, tool: ExternalTool) -> Self {
        self.orca = Some(tool);
        self
    }
    pub fn memory_mb(mut self, memory: u64) -> Self {
        self.memory_mb = Some(memory);
        self
    }
    pub fn core_count(mut self, cores: usize) -> Self {
        self.core_count = Some(cores);
        self
    }
    pub fn net_charge(mut self, charge: i32) -> Self {
        self.net_charge = Some(charge);
        self
    }
    pub fn solvent(mut self, solvent: impl Into<String>) -> Self {
        self.solvent = Some(solvent.into());
        self
    }
    pub fn ground_state_frequencies(mut self, enabled: bool) -> Self {
        self.ground_state_frequencies = Some(enabled);
        self
    }
    pub fn excited_state_frequencies(mut self, enabled: bool) -> Self {
        self.excited_state_frequencies = Some(enabled);
        self
    }
    pub fn batch_concurrency(mut self, limit: usize) -> Self {
        self.batch_concurrency = Some(limit);
        self
    }

    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let project_name = self
            .project_name
            .ok_or(ConfigError::MissingParameter("project_name"))?;
        if project_name.trim().is_empty() || project_name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                parameter: "project_name",
                reason: format!("'{}' is not a valid file name stem", project_name),
            });
        }

        let batch_concurrency = self.batch_concurrency.unwrap_or(4);
        if batch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "batch_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }

        let defaults = OrcaSettings::default();
        let core_count = self.core_count.unwrap_or(defaults.core_count);
        if core_count == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "core_count",
                reason: "must be at least 1".to_string(),
            });
        }
        let memory_mb = self.memory_mb.unwrap_or(defaults.memory_mb);
        if memory_mb == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "memory_mb",
                reason: "must be positive".to_string(),
            });
        }

        let amber = self.amber.unwrap_or_default();
        if amber.launcher.is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "amber.launcher",
                reason: "must name a program".to_string(),
            });
        }
        if amber.snapshot_interval == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "amber.snapshot_interval",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(PipelineConfig {
            project_name,
            project_path: self
                .project_path
                .ok_or(ConfigError::MissingParameter("project_path"))?,
            converter: self
                .converter
                .unwrap_or_else(|| ExternalTool::new("obabel")),
            amber,
            mopac: self.mopac.ok_or(ConfigError::MissingParameter("mopac"))?,
            mopac_header: self.mopac_header.unwrap_or_default(),
            orca: self.orca.ok_or(ConfigError::MissingParameter("orca"))?,
            orca_settings: OrcaSettings {
                memory_mb,
                core_count,
                net_charge: self.net_charge.unwrap_or(defaults.net_charge),
                solvent: self.solvent.unwrap_or(defaults.solvent),
                ..defaults
            },
            ground_state_frequencies: self.ground_state_frequencies.unwrap_or(true),
            excited_state_frequencies: self.excited_state_frequencies.unwrap_or(true),
            batch_concurrency,
        })
    }
}
