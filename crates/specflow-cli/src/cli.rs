use clap::{Args, Parser, Subcommand};
use specflow::engine::state::Stage;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "specflow - runs a molecule through conformer search, semi-empirical screening and excited-state quantum chemistry.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline, from the structure build or from any later stage.
    Run(RunArgs),
    /// Create or inspect the configuration file.
    Config(ConfigArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    // --- Inputs ---
    /// Path to the configuration file in TOML format.
    /// Defaults to the per-user configuration file when it exists.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Initial structure as a MOL block, converted to mol2 before the conformer search.
    #[arg(long, value_name = "PATH", conflicts_with = "mol2")]
    pub structure: Option<PathBuf>,

    /// Initial structure as a ready mol2 file.
    #[arg(long, value_name = "PATH")]
    pub mol2: Option<PathBuf>,

    /// Stage to start at; its inputs are discovered in the project directory.
    #[arg(long, value_name = "STAGE", default_value = "structure-build")]
    pub from: Stage,

    // --- Overrides ---
    /// Override the project name from the config file.
    #[arg(short = 'n', long, value_name = "NAME")]
    pub project_name: Option<String>,

    /// Override the project directory from the config file.
    #[arg(short = 'd', long, value_name = "PATH")]
    pub project_path: Option<PathBuf>,

    /// Override the number of semi-empirical jobs run at once.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub jobs: Option<usize>,

    #[command(flatten)]
    pub decision: DecisionFlags,

    /// Print the raw output of the external engines.
    #[arg(long)]
    pub show_output: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S quantum.core-count=8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Mutually exclusive flags that answer the frequency gate in advance.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct DecisionFlags {
    /// Continue past negative frequencies without asking.
    #[arg(short = 'y', long)]
    pub yes: bool,
    /// Stop at the first negative frequency without asking.
    #[arg(long)]
    pub no: bool,
}

impl DecisionFlags {
    /// The fixed answer, or `None` to ask interactively.
    pub fn answer(self) -> Option<bool> {
        match (self.yes, self.no) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Arguments for the `config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a documented default configuration file.
    Init {
        /// Where to write the file. Defaults to the per-user configuration file.
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration a run would use, after defaults and overrides are applied.
    Show {
        /// Path to the configuration file in TOML format.
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Set a specific configuration value. Can be used multiple times.
        #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
        set_values: Vec<String>,
    },
}
