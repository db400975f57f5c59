//! Service configuration: defaults, optional TOML file, environment overrides.

mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str, ENV_PREFIX};
pub use types::*;
pub use validate::validate_config;

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed or merged.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// The configuration parsed but holds unusable values.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
