//! Configuration parsing and types.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

pub use parser::load_config;
pub use types::*;

use crate::common::error::{ConfigError, Result};

/// Load the config file, apply environment overrides, and validate.
pub fn load_and_validate(path: &str) -> Result<Config> {
    let empty = env::check_empty_env_vars();
    if !empty.is_empty() {
        return Err(ConfigError::ValidationError {
            message: format!("environment variables set but empty: {}", empty.join(", ")),
        }
        .into());
    }

    let config = env::apply_env_overrides(load_config(path)?);
    validate::validate_config(&config)?;
    Ok(config)
}
