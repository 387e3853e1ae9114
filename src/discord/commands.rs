//! Prefixed bridge commands (`$listnicks`).
//!
//! The same parser serves both sides: from IRC, `listnicks` lists the Discord
//! member directory; from Discord, it asks IRC for a NAMES roster.

use tracing::debug;

use crate::common::BridgeCommand;

/// Parse a prefixed command. Anything that is not a known command,
/// including unknown prefixed words, yields `None` and is relayed as text.
pub fn parse_command(prefix: &str, text: &str) -> Option<BridgeCommand> {
    if prefix.is_empty() {
        return None;
    }

    let body = text.trim().strip_prefix(prefix)?;
    if body.starts_with(char::is_whitespace) {
        return None;
    }
    let command = body.split_whitespace().next()?.to_lowercase();

    debug!("Processing command: {}", command);

    match command.as_str() {
        "listnicks" => Some(BridgeCommand::ListNicks),
        _ => None,
    }
}
