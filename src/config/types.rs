//! Configuration type definitions.

use serde::{Deserialize, Deserializer};

use crate::common::types::Snowflake;

/// Default IRC port (TLS).
pub const DEFAULT_IRC_PORT: u16 = 6697;

/// Default command prefix.
pub const DEFAULT_PREFIX: &str = "$";

/// Root configuration structure.
///
/// Keys follow the bridge's `config.json` naming (`IRC_SERVER`, `DISCORD_TOKEN`, ...).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub irc_server: String,
    #[serde(default = "default_irc_port")]
    pub irc_port: u16,
    #[serde(default = "default_true")]
    pub irc_tls: bool,
    /// Bridge nick, also the SASL account name.
    pub irc_user: String,
    /// SASL password.
    pub irc_password: String,
    pub irc_channel: String,
    #[serde(default)]
    pub irc_channel_password: Option<String>,
    pub discord_token: String,
    #[serde(deserialize_with = "deserialize_snowflake")]
    pub discord_bridge_channel: Snowflake,
    #[serde(deserialize_with = "deserialize_snowflake")]
    pub discord_bridge_server: Snowflake,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub log_all_messages: bool,
    /// Patterns that block IRC -> Discord relays.
    #[serde(default)]
    pub irc_to_discord_filters: Option<Vec<String>>,
    /// Patterns that block Discord -> IRC relays.
    #[serde(default)]
    pub discord_to_irc_filters: Option<Vec<String>>,
}

impl Config {
    /// Channel key to send with JOIN, if any.
    pub fn irc_channel_key(&self) -> Option<&str> {
        self.irc_channel_password
            .as_deref()
            .filter(|key| !key.is_empty())
    }
}

fn default_irc_port() -> u16 {
    DEFAULT_IRC_PORT
}

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

/// Accept snowflakes as decimal strings (the usual form, safe from float
/// precision loss in JSON tooling) or as plain numbers.
fn deserialize_snowflake<'de, D>(deserializer: D) -> Result<Snowflake, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSnowflake {
        Text(String),
        Number(u64),
    }

    match RawSnowflake::deserialize(deserializer)? {
        RawSnowflake::Number(id) => Ok(id),
        RawSnowflake::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid snowflake '{}'", text))),
    }
}

#[cfg(test)]
pub(crate) fn make_test_config() -> Config {
    Config {
        irc_server: "irc.example.net".to_string(),
        irc_port: DEFAULT_IRC_PORT,
        irc_tls: true,
        irc_user: "BridgeBot".to_string(),
        irc_password: "hunter2".to_string(),
        irc_channel: "##bridge".to_string(),
        irc_channel_password: None,
        discord_token: "valid_token_here".to_string(),
        discord_bridge_channel: 1000,
        discord_bridge_server: 2000,
        prefix: DEFAULT_PREFIX.to_string(),
        log_all_messages: false,
        irc_to_discord_filters: None,
        discord_to_irc_filters: None,
    }
}
