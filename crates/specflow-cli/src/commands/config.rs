use crate::cli::{ConfigArgs, ConfigCommands};
use crate::config::{CliOverrides, DEFAULT_TEMPLATE, PartialPipelineConfig, default_config_path};
use crate::error::{CliError, Result};
use std::fs;
use std::path::Path;
use tracing::info;

pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => {
            let path = match path {
                Some(path) => path,
                None => default_config_path()?,
            };
            write_template(&path, force)?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigCommands::Show { config, set_values } => {
            print!("{}", render_effective(config.as_deref(), &set_values)?);
        }
    }
    Ok(())
}

fn write_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::Argument(format!(
            "'{}' already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_TEMPLATE)?;
    info!(path = %path.display(), "Default configuration written.");
    Ok(())
}

/// The configuration a run would use, as TOML.
fn render_effective(config: Option<&Path>, set_values: &[String]) -> Result<String> {
    let resolved = PartialPipelineConfig::load(config)?.merge_with_cli(&CliOverrides {
        set_values,
        ..CliOverrides::default()
    })?;
    toml::to_string_pretty(&PartialPipelineConfig::from(&resolved))
        .map_err(|e| CliError::Other(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_writes_the_template_into_missing_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_template(&path, false).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_TEMPLATE);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[project]\nname = \"mine\"\n").unwrap();

        assert!(matches!(
            write_template(&path, false),
            Err(CliError::Argument(_))
        ));
        assert!(fs::read_to_string(&path).unwrap().contains("mine"));

        write_template(&path, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_TEMPLATE);
    }

    #[test]
    fn show_prints_merged_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, DEFAULT_TEMPLATE).unwrap();
        let set = vec!["quantum.solvent=toluene".to_string()];

        let text = render_effective(Some(&path), &set).unwrap();

        assert!(text.contains("name = \"molecule\""));
        assert!(text.contains("solvent = \"toluene\""));
        assert!(text.contains("engines.orca"));
    }

    #[test]
    fn show_reports_parse_errors_with_the_file_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[project\n").unwrap();

        let err = render_effective(Some(&path), &[]).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
