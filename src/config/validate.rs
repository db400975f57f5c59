use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Upload timeout is not 0
/// - Default subdirectories are not blank
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.upload.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "upload.timeout_secs cannot be 0".to_string(),
        ));
    }

    for (key, value) in [
        ("storage.default_input", &config.storage.default_input),
        ("storage.default_output", &config.storage.default_output),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{key} cannot be empty"
            )));
        }
    }

    Ok(())
}
