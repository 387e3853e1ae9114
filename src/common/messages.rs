//! Canonical event types for bridge communication.
//!
//! Both collaborator adapters translate their native events into these
//! types and push them into the single event channel drained by the bridge.

use crate::common::types::{Attachment, DiscordAuthor, IrcSource, MentionedUser, Snowflake};

/// Any event the bridge reacts to.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Irc(IrcEvent),
    Discord(DiscordEvent),
}

/// Events produced by the IRC connection.
#[derive(Debug, Clone, PartialEq)]
pub enum IrcEvent {
    /// SASL authentication completed.
    Registered,
    /// Channel or private message.
    Privmsg {
        source: Option<IrcSource>,
        target: String,
        text: String,
    },
    /// CTCP ACTION (`/me`).
    Action {
        source: Option<IrcSource>,
        target: String,
        text: String,
    },
    Join {
        source: Option<IrcSource>,
        channel: String,
    },
    Part {
        source: Option<IrcSource>,
        channel: String,
        reason: Option<String>,
    },
    Quit {
        source: Option<IrcSource>,
        reason: Option<String>,
    },
    Nick {
        source: Option<IrcSource>,
        new_nick: String,
    },
    /// Complete NAMES roster for a channel (sent after RPL_ENDOFNAMES).
    Names { channel: String, names: Vec<String> },
    /// Every line received, for verbose logging.
    Raw { line: String },
}

/// Events produced by the Discord gateway.
#[derive(Debug, Clone)]
pub enum DiscordEvent {
    /// Gateway session is ready.
    Ready { bot_id: Snowflake },
    MessageCreate(DiscordMessage),
    MessageUpdate(DiscordMessageUpdate),
}

/// A newly created Discord message.
#[derive(Debug, Clone)]
pub struct DiscordMessage {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author: DiscordAuthor,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub mentioned_users: Vec<MentionedUser>,
    /// Message this one replies to.
    pub reply_to: Option<Snowflake>,
    /// Content of the replied-to message when the gateway included it.
    pub reply_content: Option<String>,
}

/// A Discord message edit. Most fields are optional on the gateway.
#[derive(Debug, Clone)]
pub struct DiscordMessageUpdate {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author: Option<DiscordAuthor>,
    pub content: Option<String>,
    pub mentioned_users: Vec<MentionedUser>,
}

/// Last-known version of a Discord message, kept for edit notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSnapshot {
    pub content: String,
    pub author: String,
}

impl MessageSnapshot {
    pub fn new(content: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            author: author.into(),
        }
    }
}

impl From<&DiscordMessage> for MessageSnapshot {
    fn from(message: &DiscordMessage) -> Self {
        Self::new(message.content.clone(), message.author.name.clone())
    }
}

/// Commands understood on both sides of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeCommand {
    /// List users of the other side.
    ListNicks,
}
