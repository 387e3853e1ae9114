//! Discord collaborator seam.
//!
//! The bridge only talks to Discord through this trait; the serenity-backed
//! implementation lives in `discord::client`.

use std::collections::HashMap;

use serenity::async_trait;

use crate::common::error::DiscordResult;
use crate::common::types::{ChannelInfo, MemberInfo, Snowflake};

/// REST operations the bridge needs from Discord.
#[async_trait]
pub trait DiscordService: Send + Sync {
    /// Post a message to a channel.
    async fn send_message(&self, channel_id: Snowflake, content: &str) -> DiscordResult<()>;

    async fn get_channel(&self, channel_id: Snowflake) -> DiscordResult<ChannelInfo>;

    /// Username of a user.
    async fn get_user(&self, user_id: Snowflake) -> DiscordResult<String>;

    /// First `limit` members of a guild.
    async fn get_members(&self, guild_id: Snowflake, limit: u64) -> DiscordResult<Vec<MemberInfo>>;

    /// Content of a single message.
    async fn get_message(&self, channel_id: Snowflake, message_id: Snowflake) -> DiscordResult<String>;

    /// Role id -> role name for a guild.
    async fn get_roles(&self, guild_id: Snowflake) -> DiscordResult<HashMap<Snowflake, String>>;
}
