//! Configuration file loading.
//!
//! ## Responsibility
//! Read a TOML file from disk, parse it into a [`MigratorConfig`], overlay
//! the environment when asked to, and run validation before returning.
//!
//! ## Guarantees
//! - A successfully loaded config is always validated
//! - I/O errors and parse errors are distinguished in the error type
//! - File path is included in every error message
//!
//! ## NOT Responsible For
//! - Defining the config schema (that belongs to `mod.rs`)

use std::path::Path;

use super::validation::{self, ConfigError};
use super::MigratorConfig;

/// Load a [`MigratorConfig`] from a TOML file.
///
/// # Returns
///
/// - `Ok(MigratorConfig)` if the file is readable, well-formed, and valid.
/// - `Err(ConfigError::Io)` if the file cannot be read.
/// - `Err(ConfigError::Parse)` if the TOML is malformed.
/// - `Err(ConfigError::Validation)` if semantic constraints are violated.
///
/// # Panics
///
/// This function never panics.
///
/// # Example
///
/// ```rust,ignore
/// use backend_migrator::config::loader::load_from_file;
/// use std::path::Path;
///
/// let config = load_from_file(Path::new("migrator.toml"))?;
/// println!("REST backend: {}", config.rest.base_url);
/// ```
pub fn load_from_file(path: &Path) -> Result<MigratorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    load_from_str(&content, &path.display().to_string())
}

/// Load a [`MigratorConfig`] from a TOML file, then overlay environment
/// variables before validating.
///
/// # Errors
///
/// Same as [`load_from_file`], plus [`ConfigError::Env`] for unparseable
/// variables.
///
/// # Panics
///
/// This function never panics.
pub fn load_with_env(path: &Path) -> Result<MigratorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    let mut config = parse(&content, &path.display().to_string())?;
    config.apply_env()?;
    validation::validate(&config).map_err(validation::join_errors)?;
    Ok(config)
}

/// Load a [`MigratorConfig`] from a TOML string.
///
/// # Arguments
///
/// * `content`: TOML content as a string.
/// * `source_name`: Identifier for the source (used in error messages).
///
/// # Returns
///
/// - `Ok(MigratorConfig)` if the TOML is well-formed and valid.
/// - `Err(ConfigError::Parse)` if the TOML is malformed.
/// - `Err(ConfigError::Validation)` if semantic constraints are violated.
///
/// # Panics
///
/// This function never panics.
pub fn load_from_str(content: &str, source_name: &str) -> Result<MigratorConfig, ConfigError> {
    let config = parse(content, source_name)?;
    validation::validate(&config).map_err(validation::join_errors)?;
    Ok(config)
}

fn parse(content: &str, source_name: &str) -> Result<MigratorConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: source_name.to_string(),
        source: e,
    })
}
