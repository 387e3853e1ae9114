//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `IRCORD_DISCORD_TOKEN` - Discord bot token
//! - `IRCORD_IRC_PASSWORD` - SASL password
//! - `IRCORD_IRC_SERVER` - IRC server host
//! - `IRCORD_IRC_PORT` - IRC server port
//! - `IRCORD_IRC_USER` - Bridge nick
//! - `IRCORD_IRC_CHANNEL` - Bridged IRC channel

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "IRCORD";

/// Apply environment variable overrides to a config.
///
/// This allows secrets like the bot token and SASL password to be
/// provided via environment variables instead of the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        config.discord_token = token;
    }
    if let Ok(password) = env::var(format!("{}_IRC_PASSWORD", ENV_PREFIX)) {
        config.irc_password = password;
    }

    if let Ok(server) = env::var(format!("{}_IRC_SERVER", ENV_PREFIX)) {
        config.irc_server = server;
    }
    if let Ok(port) = env::var(format!("{}_IRC_PORT", ENV_PREFIX)) {
        if let Ok(port) = port.parse() {
            config.irc_port = port;
        }
    }
    if let Ok(nick) = env::var(format!("{}_IRC_USER", ENV_PREFIX)) {
        config.irc_user = nick;
    }
    if let Ok(channel) = env::var(format!("{}_IRC_CHANNEL", ENV_PREFIX)) {
        config.irc_channel = channel;
    }

    config
}

/// Check if any secret environment variables are set but empty.
///
/// Returns a list of variable names that are set but empty.
pub fn check_empty_env_vars() -> Vec<String> {
    let vars = [
        format!("{}_DISCORD_TOKEN", ENV_PREFIX),
        format!("{}_IRC_PASSWORD", ENV_PREFIX),
    ];

    vars.into_iter()
        .filter(|var| env::var(var).map(|v| v.is_empty()).unwrap_or(false))
        .collect()
}

/// Get the config file path from environment or use default.
///
/// Checks `IRCORD_CONFIG` environment variable, otherwise returns "config.json".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "config.json".to_string())
}
