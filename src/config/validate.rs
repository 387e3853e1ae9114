//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use fancy_regex::Regex;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Discord
    if config.discord_token.is_empty() {
        errors.push("DISCORD_TOKEN is required".to_string());
    }
    if config.discord_token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("DISCORD_TOKEN has not been configured (still using placeholder)".to_string());
    }
    if config.discord_bridge_channel == 0 {
        errors.push("DISCORD_BRIDGE_CHANNEL must be non-zero".to_string());
    }
    if config.discord_bridge_server == 0 {
        errors.push("DISCORD_BRIDGE_SERVER must be non-zero".to_string());
    }

    // IRC
    if config.irc_server.is_empty() {
        errors.push("IRC_SERVER is required".to_string());
    }
    if config.irc_port == 0 {
        errors.push("IRC_PORT must be non-zero".to_string());
    }
    if config.irc_user.is_empty() {
        errors.push("IRC_USER is required".to_string());
    }
    if config.irc_user.contains(char::is_whitespace) {
        errors.push(format!("IRC_USER '{}' must not contain spaces", config.irc_user));
    }
    if config.irc_password.is_empty() {
        errors.push("IRC_PASSWORD is required for SASL".to_string());
    }
    if !config.irc_channel.starts_with(['#', '&']) {
        errors.push(format!(
            "IRC_CHANNEL '{}' must start with '#' or '&'",
            config.irc_channel
        ));
    }

    if config.prefix.is_empty() {
        errors.push("PREFIX must not be empty".to_string());
    }

    // Filter patterns must compile
    let filter_lists = [
        ("IRC_TO_DISCORD_FILTERS", &config.irc_to_discord_filters),
        ("DISCORD_TO_IRC_FILTERS", &config.discord_to_irc_filters),
    ];
    for (key, patterns) in filter_lists {
        for (i, pattern) in patterns.iter().flatten().enumerate() {
            if Regex::new(pattern).is_err() {
                errors.push(format!("{}[{}] is not a valid regex: '{}'", key, i, pattern));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
