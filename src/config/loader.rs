//! Configuration loading from disk.
//!
//! A config directory holds `application.toml` plus optional
//! `application-<profile>.toml` overlays. Overlays are applied in the order
//! the profiles are listed: tables merge key by key, anything else replaces.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::profile::ActiveProfiles;
use crate::config::schema::GatekeeperConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const BASE_FILE: &str = "application.toml";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("merged configuration is malformed: {0}")]
    Shape(#[source] toml::de::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn profile_file(profile: &str) -> String {
    format!("application-{}.toml", profile)
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    content.parse::<toml::Table>().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn finish(table: toml::Table) -> Result<GatekeeperConfig, ConfigError> {
    let config: GatekeeperConfig = toml::Value::Table(table).try_into().map_err(ConfigError::Shape)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Deep-merge `overlay` into `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Load and validate configuration from a single TOML file.
pub fn load_config(path: &Path) -> Result<GatekeeperConfig, ConfigError> {
    finish(read_table(path)?)
}

/// Load `application.toml` from `dir` and overlay the active profiles' files.
///
/// The base file is required; a profile without a file is skipped.
pub fn load_profiled(dir: &Path, profiles: &ActiveProfiles) -> Result<GatekeeperConfig, ConfigError> {
    let mut table = read_table(&dir.join(BASE_FILE))?;

    for profile in profiles.iter() {
        let path = dir.join(profile_file(profile));
        if !path.is_file() {
            tracing::debug!(profile, path = %path.display(), "No overlay for profile");
            continue;
        }
        merge_tables(&mut table, read_table(&path)?);
        tracing::debug!(profile, path = %path.display(), "Applied profile overlay");
    }

    finish(table)
}
