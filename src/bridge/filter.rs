//! Regex deny-lists for relayed lines.
//!
//! Patterns are matched against the visible text of the line about to be
//! sent: IRC control codes are removed first, so a pattern like `^<\w+> !`
//! still catches `<bob> \x02!seen\x02 alice` once markdown has become codes.

use fancy_regex::Regex;
use tracing::warn;

use crate::config::types::Config;

/// Direction of message flow for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDirection {
    IrcToDiscord,
    DiscordToIrc,
}

impl FilterDirection {
    pub fn label(self) -> &'static str {
        match self {
            FilterDirection::IrcToDiscord => "IRC -> Discord",
            FilterDirection::DiscordToIrc => "Discord -> IRC",
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// Per-direction pattern lists taken from `IRC_TO_DISCORD_FILTERS` and
/// `DISCORD_TO_IRC_FILTERS`.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    irc_to_discord: Vec<CompiledPattern>,
    discord_to_irc: Vec<CompiledPattern>,
    /// Bold, italic, underline, strike, reset, reverse and mIRC colors.
    control_codes: Regex,
}

impl MessageFilter {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.irc_to_discord_filters.as_deref().unwrap_or_default(),
            config.discord_to_irc_filters.as_deref().unwrap_or_default(),
        )
    }

    /// Invalid patterns are logged and skipped; validation normally rejects
    /// them before this point.
    pub fn new(irc_to_discord: &[String], discord_to_irc: &[String]) -> Self {
        Self {
            irc_to_discord: compile_patterns(FilterDirection::IrcToDiscord, irc_to_discord),
            discord_to_irc: compile_patterns(FilterDirection::DiscordToIrc, discord_to_irc),
            control_codes: Regex::new(r"\x03(?:\d{1,2}(?:,\d{1,2})?)?|[\x02\x0F\x16\x1D\x1E\x1F]")
                .unwrap(),
        }
    }

    /// The first pattern that blocks `line`, if any.
    ///
    /// A pattern that errors while matching (backtrack limit) does not block.
    pub fn blocking_pattern(&self, direction: FilterDirection, line: &str) -> Option<&str> {
        let patterns = match direction {
            FilterDirection::IrcToDiscord => &self.irc_to_discord,
            FilterDirection::DiscordToIrc => &self.discord_to_irc,
        };
        if patterns.is_empty() {
            return None;
        }

        let visible = self.control_codes.replace_all(line, "");
        patterns
            .iter()
            .find(|p| match p.regex.is_match(&visible) {
                Ok(matched) => matched,
                Err(e) => {
                    warn!("{} filter '{}' failed to match: {}", direction.label(), p.source, e);
                    false
                }
            })
            .map(|p| p.source.as_str())
    }

    pub fn pattern_count(&self) -> usize {
        self.irc_to_discord.len() + self.discord_to_irc.len()
    }
}

fn compile_patterns(direction: FilterDirection, patterns: &[String]) -> Vec<CompiledPattern> {
    patterns
        .iter()
        .filter_map(|source| match Regex::new(source) {
            Ok(regex) => Some(CompiledPattern {
                source: source.clone(),
                regex,
            }),
            Err(e) => {
                warn!("Skipping invalid {} filter '{}': {}", direction.label(), source, e);
                None
            }
        })
        .collect()
}
