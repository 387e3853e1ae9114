//! In-memory fakes of the Discord and IRC collaborators for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use serenity::async_trait;

use crate::common::error::{DiscordError, DiscordResult, IrcResult};
use crate::common::types::{ChannelInfo, MemberInfo, Snowflake};
use crate::discord::service::DiscordService;
use crate::ircnet::service::IrcService;

/// Records sends and serves canned lookups. Unknown ids fail the lookup.
#[derive(Default)]
pub struct FakeDiscord {
    pub sent: Mutex<Vec<(Snowflake, String)>>,
    pub channels: HashMap<Snowflake, ChannelInfo>,
    pub users: HashMap<Snowflake, String>,
    pub members: Vec<MemberInfo>,
    pub messages: HashMap<Snowflake, String>,
    pub roles: HashMap<Snowflake, String>,
    pub user_lookups: Mutex<Vec<Snowflake>>,
    pub channel_lookups: Mutex<Vec<Snowflake>>,
}

impl FakeDiscord {
    pub fn with_channel(mut self, id: Snowflake, name: &str, parent_id: Option<Snowflake>) -> Self {
        self.channels.insert(
            id,
            ChannelInfo {
                id,
                name: name.to_string(),
                parent_id,
            },
        );
        self
    }

    pub fn with_user(mut self, id: Snowflake, name: &str) -> Self {
        self.users.insert(id, name.to_string());
        self
    }

    pub fn with_member(mut self, id: Snowflake, name: &str) -> Self {
        self.members.push(MemberInfo {
            user_id: id,
            username: name.to_string(),
        });
        self
    }

    pub fn with_role(mut self, id: Snowflake, name: &str) -> Self {
        self.roles.insert(id, name.to_string());
        self
    }

    pub fn with_message(mut self, id: Snowflake, content: &str) -> Self {
        self.messages.insert(id, content.to_string());
        self
    }

    pub fn sent(&self) -> Vec<(Snowflake, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }
}

#[async_trait]
impl DiscordService for FakeDiscord {
    async fn send_message(&self, channel_id: Snowflake, content: &str) -> DiscordResult<()> {
        self.sent.lock().unwrap().push((channel_id, content.to_string()));
        Ok(())
    }

    async fn get_channel(&self, channel_id: Snowflake) -> DiscordResult<ChannelInfo> {
        self.channel_lookups.lock().unwrap().push(channel_id);
        self.channels
            .get(&channel_id)
            .cloned()
            .ok_or(DiscordError::NotFound { kind: "Channel", id: channel_id })
    }

    async fn get_user(&self, user_id: Snowflake) -> DiscordResult<String> {
        self.user_lookups.lock().unwrap().push(user_id);
        self.users
            .get(&user_id)
            .cloned()
            .ok_or(DiscordError::NotFound { kind: "User", id: user_id })
    }

    async fn get_members(&self, _guild_id: Snowflake, limit: u64) -> DiscordResult<Vec<MemberInfo>> {
        Ok(self.members.iter().take(limit as usize).cloned().collect())
    }

    async fn get_message(&self, _channel_id: Snowflake, message_id: Snowflake) -> DiscordResult<String> {
        self.messages
            .get(&message_id)
            .cloned()
            .ok_or(DiscordError::NotFound { kind: "Message", id: message_id })
    }

    async fn get_roles(&self, _guild_id: Snowflake) -> DiscordResult<HashMap<Snowflake, String>> {
        Ok(self.roles.clone())
    }
}

/// A line-level record of what the bridge asked IRC to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcCall {
    Privmsg(String, String),
    Join(String, Option<String>),
    Names(String),
}

#[derive(Default)]
pub struct FakeIrc {
    pub calls: Mutex<Vec<IrcCall>>,
}

impl FakeIrc {
    pub fn calls(&self) -> Vec<IrcCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn privmsgs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                IrcCall::Privmsg(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl IrcService for FakeIrc {
    fn privmsg(&self, target: &str, text: &str) -> IrcResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(IrcCall::Privmsg(target.to_string(), text.to_string()));
        Ok(())
    }

    fn join(&self, channel: &str, key: Option<&str>) -> IrcResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(IrcCall::Join(channel.to_string(), key.map(String::from)));
        Ok(())
    }

    fn names(&self, channel: &str) -> IrcResult<()> {
        self.calls.lock().unwrap().push(IrcCall::Names(channel.to_string()));
        Ok(())
    }
}
