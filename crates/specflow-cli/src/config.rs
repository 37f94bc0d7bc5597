use crate::error::{CliError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use specflow::core::io::mopac::MopacHeader;
use specflow::engine::config::{AmberConfig, ExternalTool, PipelineConfig, PipelineConfigBuilder};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// The documented template written by `specflow config init`.
pub const DEFAULT_TEMPLATE: &str = include_str!("config/default.toml");

const DEFAULT_MOPAC: &str = "mopac";
const DEFAULT_ORCA: &str = "orca";
/// Environment variable naming the ORCA executable when the file leaves it unset.
const ORCA_ENV: &str = "ORCA";

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialProjectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialToolConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_exit_codes: Option<Vec<i32>>,
}

impl PartialToolConfig {
    fn into_tool(self, default_executable: String) -> Result<ExternalTool> {
        let executable = absolute_if_relative_path(
            self.executable
                .unwrap_or_else(|| PathBuf::from(default_executable)),
        )?;
        let tool = ExternalTool::new(executable);
        Ok(match self.success_exit_codes {
            Some(codes) => tool.with_success_exit_codes(codes),
            None => tool,
        })
    }
}

impl From<&ExternalTool> for PartialToolConfig {
    fn from(tool: &ExternalTool) -> Self {
        Self {
            executable: Some(tool.executable.clone()),
            success_exit_codes: Some(tool.success_exit_codes.clone()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialEnginesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converter: Option<PartialToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mopac: Option<PartialToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orca: Option<PartialToolConfig>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialAmberConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launcher: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_exit_codes: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md_steps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_prefix: Option<String>,
}

impl PartialAmberConfig {
    fn into_config(self) -> AmberConfig {
        let defaults = AmberConfig::default();
        AmberConfig {
            launcher: self.launcher.unwrap_or(defaults.launcher),
            setup: self.setup.or(defaults.setup),
            success_exit_codes: self
                .success_exit_codes
                .unwrap_or(defaults.success_exit_codes),
            md_steps: self.md_steps.unwrap_or(defaults.md_steps),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            snapshot_interval: self.snapshot_interval.unwrap_or(defaults.snapshot_interval),
            title_prefix: self.title_prefix.unwrap_or(defaults.title_prefix),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialBatchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialQuantumConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_charge: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solvent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_state_frequencies: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excited_state_frequencies: Option<bool>,
}

/// The configuration file as written by the user; every key is optional.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialPipelineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<PartialProjectConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engines: Option<PartialEnginesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amber: Option<PartialAmberConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<PartialBatchConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantum: Option<PartialQuantumConfig>,
}

/// Values given on the command line, which take precedence over the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct CliOverrides<'a> {
    pub project_name: Option<&'a str>,
    pub project_path: Option<&'a Path>,
    pub jobs: Option<usize>,
    pub set_values: &'a [String],
}

impl PartialPipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads `path`, or the per-user file when no path is given and that file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match default_config_path() {
            Ok(path) if path.is_file() => Self::from_file(&path),
            _ => {
                debug!("No configuration file found; using built-in defaults.");
                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli(mut self, overrides: &CliOverrides<'_>) -> Result<PipelineConfig> {
        self.apply_set_values(overrides.set_values)?;

        let project = self.project.take().unwrap_or_default();
        let engines = self.engines.take().unwrap_or_default();
        let batch = self.batch.take().unwrap_or_default();
        let quantum = self.quantum.take().unwrap_or_default();

        let project_name = overrides
            .project_name
            .map(str::to_string)
            .or(project.name)
            .ok_or_else(|| {
                CliError::Config(
                    "A value for 'project.name' is required either in the config file or via --project-name."
                        .to_string(),
                )
            })?;
        let project_path = absolute(
            overrides
                .project_path
                .map(Path::to_path_buf)
                .or(project.path)
                .unwrap_or_else(|| PathBuf::from(".")),
        )?;

        let orca_default = env::var(ORCA_ENV).unwrap_or_else(|_| DEFAULT_ORCA.to_string());
        let header_defaults = MopacHeader::default();
        let mopac_header = MopacHeader {
            keywords: batch.keywords.unwrap_or(header_defaults.keywords),
            title: batch.title.unwrap_or(header_defaults.title),
            comment: batch.comment.unwrap_or(header_defaults.comment),
        };

        let mut builder = PipelineConfigBuilder::new()
            .project_name(project_name)
            .project_path(project_path)
            .converter(
                engines
                    .converter
                    .unwrap_or_default()
                    .into_tool("obabel".to_string())?,
            )
            .mopac(
                engines
                    .mopac
                    .unwrap_or_default()
                    .into_tool(DEFAULT_MOPAC.to_string())?,
            )
            .orca(engines.orca.unwrap_or_default().into_tool(orca_default)?)
            .amber(self.amber.take().unwrap_or_default().into_config())
            .mopac_header(mopac_header);

        if let Some(jobs) = overrides.jobs.or(batch.concurrency) {
            builder = builder.batch_concurrency(jobs);
        }
        if let Some(memory) = quantum.memory_mb {
            builder = builder.memory_mb(memory);
        }
        if let Some(cores) = quantum.core_count {
            builder = builder.core_count(cores);
        }
        if let Some(charge) = quantum.net_charge {
            builder = builder.net_charge(charge);
        }
        if let Some(solvent) = quantum.solvent {
            builder = builder.solvent(solvent);
        }
        if let Some(enabled) = quantum.ground_state_frequencies {
            builder = builder.ground_state_frequencies(enabled);
        }
        if let Some(enabled) = quantum.excited_state_frequencies {
            builder = builder.excited_state_frequencies(enabled);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let (key, value) = (key.trim(), value.trim());

            if let Some((engine, field)) = key
                .strip_prefix("engines.")
                .and_then(|rest| rest.split_once('.'))
            {
                self.apply_engine_value(key, engine, field, value)?;
                continue;
            }

            match key {
                "project.name" => self.project_mut().name = Some(value.to_string()),
                "project.path" => self.project_mut().path = Some(PathBuf::from(value)),

                "amber.launcher" => {
                    self.amber_mut().launcher =
                        Some(value.split_whitespace().map(str::to_string).collect())
                }
                "amber.setup" => self.amber_mut().setup = Some(value.to_string()),
                "amber.success-exit-codes" => {
                    self.amber_mut().success_exit_codes = Some(parse_list(key, value)?)
                }
                "amber.md-steps" => self.amber_mut().md_steps = Some(parse_value(key, value)?),
                "amber.temperature" => {
                    self.amber_mut().temperature = Some(parse_value(key, value)?)
                }
                "amber.snapshot-interval" => {
                    self.amber_mut().snapshot_interval = Some(parse_value(key, value)?)
                }
                "amber.title-prefix" => self.amber_mut().title_prefix = Some(value.to_string()),

                "batch.concurrency" => {
                    self.batch_mut().concurrency = Some(parse_value(key, value)?)
                }
                "batch.keywords" => self.batch_mut().keywords = Some(value.to_string()),
                "batch.title" => self.batch_mut().title = Some(value.to_string()),
                "batch.comment" => self.batch_mut().comment = Some(value.to_string()),

                "quantum.memory-mb" => {
                    self.quantum_mut().memory_mb = Some(parse_value(key, value)?)
                }
                "quantum.core-count" => {
                    self.quantum_mut().core_count = Some(parse_value(key, value)?)
                }
                "quantum.net-charge" => {
                    self.quantum_mut().net_charge = Some(parse_value(key, value)?)
                }
                "quantum.solvent" => self.quantum_mut().solvent = Some(value.to_string()),
                "quantum.ground-state-frequencies" => {
                    self.quantum_mut().ground_state_frequencies = Some(parse_value(key, value)?)
                }
                "quantum.excited-state-frequencies" => {
                    self.quantum_mut().excited_state_frequencies = Some(parse_value(key, value)?)
                }

                _ => return Err(unsupported_key(key)),
            }
        }
        Ok(())
    }

    fn apply_engine_value(
        &mut self,
        key: &str,
        engine: &str,
        field: &str,
        value: &str,
    ) -> Result<()> {
        let engines = self.engines.get_or_insert_with(Default::default);
        let slot = match engine {
            "converter" => &mut engines.converter,
            "mopac" => &mut engines.mopac,
            "orca" => &mut engines.orca,
            _ => return Err(unsupported_key(key)),
        };
        let tool = slot.get_or_insert_with(Default::default);
        match field {
            "executable" => tool.executable = Some(PathBuf::from(value)),
            "success-exit-codes" => tool.success_exit_codes = Some(parse_list(key, value)?),
            _ => return Err(unsupported_key(key)),
        }
        Ok(())
    }

    fn project_mut(&mut self) -> &mut PartialProjectConfig {
        self.project.get_or_insert_with(Default::default)
    }

    fn amber_mut(&mut self) -> &mut PartialAmberConfig {
        self.amber.get_or_insert_with(Default::default)
    }

    fn batch_mut(&mut self) -> &mut PartialBatchConfig {
        self.batch.get_or_insert_with(Default::default)
    }

    fn quantum_mut(&mut self) -> &mut PartialQuantumConfig {
        self.quantum.get_or_insert_with(Default::default)
    }
}

impl From<&PipelineConfig> for PartialPipelineConfig {
    /// The fully resolved form, as printed by `specflow config show`.
    fn from(config: &PipelineConfig) -> Self {
        let settings = &config.orca_settings;
        Self {
            project: Some(PartialProjectConfig {
                name: Some(config.project_name.clone()),
                path: Some(config.project_path.clone()),
            }),
            engines: Some(PartialEnginesConfig {
                converter: Some((&config.converter).into()),
                mopac: Some((&config.mopac).into()),
                orca: Some((&config.orca).into()),
            }),
            amber: Some(PartialAmberConfig {
                launcher: Some(config.amber.launcher.clone()),
                setup: config.amber.setup.clone(),
                success_exit_codes: Some(config.amber.success_exit_codes.clone()),
                md_steps: Some(config.amber.md_steps),
                temperature: Some(config.amber.temperature),
                snapshot_interval: Some(config.amber.snapshot_interval),
                title_prefix: Some(config.amber.title_prefix.clone()),
            }),
            batch: Some(PartialBatchConfig {
                concurrency: Some(config.batch_concurrency),
                keywords: Some(config.mopac_header.keywords.clone()),
                title: Some(config.mopac_header.title.clone()),
                comment: Some(config.mopac_header.comment.clone()),
            }),
            quantum: Some(PartialQuantumConfig {
                memory_mb: Some(settings.memory_mb),
                core_count: Some(settings.core_count),
                net_charge: Some(settings.net_charge),
                solvent: Some(settings.solvent.clone()),
                ground_state_frequencies: Some(config.ground_state_frequencies),
                excited_state_frequencies: Some(config.excited_state_frequencies),
            }),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    ProjectDirs::from("edu", "caltech", "specflow")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .ok_or_else(|| CliError::Config("Could not determine config directory path.".to_string()))
}

fn unsupported_key(key: &str) -> CliError {
    CliError::Config(format!("Unsupported configuration key for --set: '{}'", key))
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

/// Parses a comma-separated list such as `0,1`.
fn parse_list<T: FromStr>(key: &str, value: &str) -> Result<Vec<T>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_value(key, item))
        .collect()
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    std::path::absolute(&path).map_err(CliError::Io)
}

/// Engines run with the project directory as their working directory, so relative paths
/// are pinned to the invocation directory. Bare names are left for `PATH` lookup.
fn absolute_if_relative_path(path: PathBuf) -> Result<PathBuf> {
    if path.is_relative() && path.components().count() > 1 {
        absolute(path)
    } else {
        Ok(path)
    }
}
