//! Shared types used across the application.

/// Discord snowflake identifier (users, channels, roles, guilds, messages).
pub type Snowflake = u64;

/// Origin of an IRC event (`nick!user@host`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcSource {
    pub nick: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl IrcSource {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            user: None,
            host: None,
        }
    }

    /// Whether this source is the given nick (IRC nicks compare case-insensitively).
    pub fn is(&self, nick: &str) -> bool {
        self.nick.eq_ignore_ascii_case(nick)
    }
}

/// Kind of a Discord mention token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MentionKind {
    /// `<@id>` or `<@!id>`.
    User,
    /// `<#id>`.
    Channel,
    /// `<@&id>`.
    Role,
}

impl MentionKind {
    /// Placeholder rendered when a mention cannot be resolved.
    pub fn unknown_placeholder(&self) -> &'static str {
        match self {
            Self::User => "UnknownUser",
            Self::Channel => "UnknownChannel",
            Self::Role => "UnknownRole",
        }
    }
}

/// A file attached to a Discord message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
}

/// The author of a Discord message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordAuthor {
    pub id: Snowflake,
    pub name: String,
    pub bot: bool,
}

/// A user object carried in a message's mention list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionedUser {
    pub id: Snowflake,
    pub name: String,
}

/// Basic information about a Discord channel or thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: Snowflake,
    pub name: String,
    /// Parent channel for threads.
    pub parent_id: Option<Snowflake>,
}

/// A guild member as listed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub user_id: Snowflake,
    pub username: String,
}
