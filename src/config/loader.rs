//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::args::Args;
use crate::config::schema::FleetConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<FleetConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<FleetConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Build the effective configuration: file (if any), then command-line overrides, then validation.
pub fn resolve(args: &Args) -> Result<FleetConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => FleetConfig::for_mode(args.mode.unwrap_or_default()),
    };
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Mode;

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_invalid_file_reports_validation() {
        let path = std::env::temp_dir().join(format!("fleet-invalid-{}.toml", std::process::id()));
        fs::write(&path, "[fleet]\nvirtual_nodes = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        fs::remove_file(&path).unwrap_or_default();

        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(err_string(&errors).contains("fleet.virtual_nodes"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_resolve_without_file() {
        let args = Args {
            mode: Some(Mode::Worker),
            master: Some("http://10.1.1.1:3000".into()),
            ..Args::default()
        };
        let config = resolve(&args).unwrap();
        assert_eq!(config.mode, Mode::Worker);
        assert_eq!(config.listener.bind_address, "127.0.0.1:0");
        assert_eq!(config.registration.master_url, "http://10.1.1.1:3000");
    }

    fn err_string(errors: &[ValidationError]) -> String {
        join(errors)
    }
}
