//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::Settings;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "failed to read config {:?}: {}", path, e),
            ConfigError::Parse(path, e) => write!(f, "failed to parse config {:?}: {}", path, e),
            ConfigError::Validation(errors) => {
                write!(f, "invalid config: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, e) => Some(e),
            ConfigError::Parse(_, e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    parse_config(path, &content)
}

/// Load the file when given, otherwise validate and return the defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Settings, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let settings = Settings::default();
            validate_config(&settings).map_err(ConfigError::Validation)?;
            Ok(settings)
        }
    }
}

fn parse_config(path: &Path, content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings =
        toml::from_str(content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;

    validate_config(&settings).map_err(ConfigError::Validation)?;

    Ok(settings)
}
