//! Markup translation between IRC control codes and Discord markdown.
//!
//! IRC -> Discord:
//! - `@name` / `@"name with spaces"` -> `<@id>` via the mention resolver
//! - 0x1D italic, 0x02 bold, 0x1E strikethrough, 0x1F underline -> markdown
//! - mIRC colors, reset and reverse codes are stripped
//!
//! Discord -> IRC:
//! - newlines flattened to ` / `
//! - markdown -> control codes, custom emojis -> `:name:`
//! - `<@id>`, `<#id>`, `<@&id>` substituted from batch-resolved names

use fancy_regex::{Captures, Regex};

use crate::common::types::{MentionKind, Snowflake};
use crate::discord::resolver::MentionResolver;

const BOLD: char = '\x02';
const ITALIC: char = '\x1D';
const STRIKE: char = '\x1E';
const UNDERLINE: char = '\x1F';

/// Separator used when flattening multi-line Discord content.
pub const LINE_SEPARATOR: &str = " / ";

/// Mention ids collected from a Discord message, per kind, in text order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionIds {
    pub users: Vec<Snowflake>,
    pub channels: Vec<Snowflake>,
    pub roles: Vec<Snowflake>,
}

impl MentionIds {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.channels.is_empty() && self.roles.is_empty()
    }
}

/// Names resolved for [`MentionIds`], aligned index-for-index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMentions {
    pub users: Vec<Option<String>>,
    pub channels: Vec<Option<String>>,
    pub roles: Vec<Option<String>>,
}

/// Pure text transforms for both relay directions.
#[derive(Debug, Clone)]
pub struct Formatter {
    /// `@"quoted name"` or `@name`.
    tag_pattern: Regex,
    irc_spans: Vec<(Regex, &'static str)>,
    /// mIRC color (`\x03fg,bg`), reset and reverse.
    irc_strip_pattern: Regex,
    markdown_spans: Vec<(Regex, char)>,
    /// `_italic_` bounded by non-word characters, which are captured.
    underscore_italic_pattern: Regex,
    /// `<:name:id>` or `<a:name:id>`.
    emoji_pattern: Regex,
    /// `<@id>`, `<@!id>`, `<#id>`, `<@&id>`.
    mention_pattern: Regex,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self {
            tag_pattern: Regex::new(r#"@(?:"([^"]+)"|([^\s"]+))"#).unwrap(),
            irc_spans: vec![
                (Regex::new("\x1D(.+?)\x1D").unwrap(), "_"),
                (Regex::new("\x02(.+?)\x02").unwrap(), "**"),
                (Regex::new("\x1E(.+?)\x1E").unwrap(), "~~"),
                (Regex::new("\x1F(.+?)\x1F").unwrap(), "__"),
            ],
            irc_strip_pattern: Regex::new(r"\x03(?:\d{1,2}(?:,\d{1,2})?)?|[\x0F\x16]").unwrap(),
            // Order matters: double delimiters before single ones.
            markdown_spans: vec![
                (Regex::new(r"\*\*(.+?)\*\*").unwrap(), BOLD),
                (Regex::new(r"__(.+?)__").unwrap(), UNDERLINE),
                (Regex::new(r"\*(.+?)\*").unwrap(), ITALIC),
                (Regex::new(r"~~(.+?)~~").unwrap(), STRIKE),
            ],
            // No lookarounds: keeps matching on the linear-time engine.
            underscore_italic_pattern: Regex::new(r"(^|\W)_([^_]+?)_(\W|$)").unwrap(),
            emoji_pattern: Regex::new(r"<a?:(\w+):\d+>").unwrap(),
            mention_pattern: Regex::new(r"<(@&|@!?|#)(\d+)>").unwrap(),
        }
    }

    /// Convert an IRC line into Discord text.
    pub fn irc_to_discord(&self, raw: &str, resolver: &MentionResolver) -> String {
        if raw.is_empty() {
            return String::new();
        }

        let tagged = self.resolve_tags(raw, resolver);

        let mut result = tagged;
        for (pattern, marker) in &self.irc_spans {
            result = pattern
                .replace_all(&result, |caps: &Captures| -> String {
                    format!("{marker}{}{marker}", &caps[1])
                })
                .to_string();
        }

        self.irc_strip_pattern.replace_all(&result, "").to_string()
    }

    /// Replace `@name` tags with Discord mentions. Unknown tags stay literal.
    fn resolve_tags(&self, raw: &str, resolver: &MentionResolver) -> String {
        self.tag_pattern
            .replace_all(raw, |caps: &Captures| -> String {
                if let Some(quoted) = caps.get(1) {
                    return match resolver.resolve(quoted.as_str()) {
                        Some(id) => format!("<@{}>", id),
                        None => caps[0].to_string(),
                    };
                }

                let name = &caps[2];
                if let Some(id) = resolver.resolve(name) {
                    return format!("<@{}>", id);
                }

                // "@alice:" or "@alice," - retry without trailing punctuation
                let trimmed = name.trim_end_matches([',', '.', ':', ';', '!', '?']);
                if !trimmed.is_empty() && trimmed.len() < name.len() {
                    if let Some(id) = resolver.resolve(trimmed) {
                        return format!("<@{}>{}", id, &name[trimmed.len()..]);
                    }
                }

                caps[0].to_string()
            })
            .to_string()
    }

    /// Scan Discord content for mention tokens, left to right.
    pub fn collect_mentions(&self, content: &str) -> MentionIds {
        let mut ids = MentionIds::default();

        for caps in self.mention_pattern.captures_iter(content).flatten() {
            let Ok(id) = caps[2].parse::<Snowflake>() else {
                continue;
            };
            match mention_kind(&caps[1]) {
                MentionKind::User => ids.users.push(id),
                MentionKind::Channel => ids.channels.push(id),
                MentionKind::Role => ids.roles.push(id),
            }
        }

        ids
    }

    /// Convert Discord content into a single IRC line.
    ///
    /// `resolved` must come from the [`MentionIds`] collected on the same
    /// content; tokens are substituted with one cursor per kind.
    pub fn discord_to_irc(&self, content: &str, resolved: &ResolvedMentions) -> String {
        let flat = flatten_lines(content);

        // Emoji names may contain markdown delimiters.
        let mut result = self
            .emoji_pattern
            .replace_all(&flat, |caps: &Captures| -> String {
                format!(":{}:", &caps[1])
            })
            .to_string();

        for (pattern, code) in &self.markdown_spans {
            result = pattern
                .replace_all(&result, |caps: &Captures| -> String {
                    format!("{code}{}{code}", &caps[1])
                })
                .to_string();
        }
        result = self.italicize_underscores(&result);

        self.substitute_mentions(&result, resolved)
    }

    /// A match consumes its trailing boundary, which hides the leading
    /// boundary of an adjacent span; the second pass picks those up.
    fn italicize_underscores(&self, text: &str) -> String {
        let mut result = text.to_string();
        for _ in 0..2 {
            result = self
                .underscore_italic_pattern
                .replace_all(&result, |caps: &Captures| -> String {
                    format!("{}{ITALIC}{}{ITALIC}{}", &caps[1], &caps[2], &caps[3])
                })
                .to_string();
        }
        result
    }

    fn substitute_mentions(&self, text: &str, resolved: &ResolvedMentions) -> String {
        let mut user_cursor = 0;
        let mut channel_cursor = 0;
        let mut role_cursor = 0;

        self.mention_pattern
            .replace_all(text, |caps: &Captures| -> String {
                let kind = mention_kind(&caps[1]);
                let (names, cursor) = match kind {
                    MentionKind::User => (&resolved.users, &mut user_cursor),
                    MentionKind::Channel => (&resolved.channels, &mut channel_cursor),
                    MentionKind::Role => (&resolved.roles, &mut role_cursor),
                };
                let name = names
                    .get(*cursor)
                    .and_then(|n| n.as_deref())
                    .unwrap_or(kind.unknown_placeholder());
                *cursor += 1;

                match kind {
                    MentionKind::User => format!("@{}", name),
                    MentionKind::Channel => format!("#{}", name),
                    MentionKind::Role => format!("@[Role]({})", name),
                }
            })
            .to_string()
    }
}

fn mention_kind(sigil: &str) -> MentionKind {
    match sigil {
        "#" => MentionKind::Channel,
        "@&" => MentionKind::Role,
        _ => MentionKind::User,
    }
}

/// Join lines with a visible separator so one Discord message stays one IRC line.
pub fn flatten_lines(content: &str) -> String {
    content
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .collect::<Vec<_>>()
        .join(LINE_SEPARATOR)
}

/// Shorten `text` to `max` characters, appending an ellipsis when cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
