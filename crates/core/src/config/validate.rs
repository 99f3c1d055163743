use super::{types::Config, ConfigError};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.storage.max_upload_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "storage.max_upload_bytes must be greater than 0".to_string(),
        ));
    }

    if config.storage.upload_dir == config.storage.output_dir {
        return Err(ConfigError::ValidationError(
            "storage.upload_dir and storage.output_dir must differ".to_string(),
        ));
    }

    if config.lifecycle.expiry_secs == 0 {
        return Err(ConfigError::ValidationError(
            "lifecycle.expiry_secs must be greater than 0".to_string(),
        ));
    }

    if config.tools.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "tools.timeout_secs must be greater than 0".to_string(),
        ));
    }

    Ok(())
}
