//! Discord bot client built on serenity.
//!
//! Gateway events are translated into [`DiscordEvent`]s and pushed to the
//! bridge; REST calls go through [`SerenityDiscord`], the serenity-backed
//! [`DiscordService`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serenity::all::{ChannelId, GuildId, MessageId, UserId};
use serenity::async_trait;
use serenity::builder::{CreateAllowedMentions, CreateMessage};
use serenity::http::{Http, HttpBuilder};
use serenity::model::channel::Message;
use serenity::model::event::MessageUpdateEvent;
use serenity::model::gateway::Ready;
use serenity::model::user::User;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::common::error::{DiscordError, DiscordResult};
use crate::common::types::{
    Attachment, ChannelInfo, DiscordAuthor, MemberInfo, MentionedUser, Snowflake,
};
use crate::common::{BridgeEvent, DiscordEvent, DiscordMessage, DiscordMessageUpdate};
use crate::discord::service::DiscordService;

/// Forwards the gateway events the bridge cares about.
struct DiscordBotEvents {
    events_tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl DiscordBotEvents {
    fn forward(&self, event: DiscordEvent) {
        if let Err(error) = self.events_tx.send(BridgeEvent::Discord(event)) {
            warn!("Failed to process discord event: {}", error);
        }
    }
}

#[async_trait]
impl EventHandler for DiscordBotEvents {
    async fn ready(&self, _context: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);
        self.forward(DiscordEvent::Ready {
            bot_id: ready.user.id.get(),
        });
    }

    async fn message(&self, _context: Context, message: Message) {
        self.forward(DiscordEvent::MessageCreate(convert_message(&message)));
    }

    async fn message_update(
        &self,
        _context: Context,
        _old_if_available: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        self.forward(DiscordEvent::MessageUpdate(convert_update(event)));
    }
}

fn convert_author(user: &User) -> DiscordAuthor {
    DiscordAuthor {
        id: user.id.get(),
        name: user.name.clone(),
        bot: user.bot,
    }
}

fn convert_mentions(users: &[User]) -> Vec<MentionedUser> {
    users
        .iter()
        .map(|user| MentionedUser {
            id: user.id.get(),
            name: user.name.clone(),
        })
        .collect()
}

fn convert_message(message: &Message) -> DiscordMessage {
    let reply_to = message
        .message_reference
        .as_ref()
        .and_then(|reference| reference.message_id)
        .map(|id| id.get());

    DiscordMessage {
        id: message.id.get(),
        channel_id: message.channel_id.get(),
        guild_id: message.guild_id.map(|id| id.get()),
        author: convert_author(&message.author),
        content: message.content.clone(),
        attachments: message
            .attachments
            .iter()
            .map(|a| Attachment {
                url: a.url.clone(),
                filename: a.filename.clone(),
            })
            .collect(),
        mentioned_users: convert_mentions(&message.mentions),
        reply_to,
        reply_content: message
            .referenced_message
            .as_ref()
            .map(|referenced| referenced.content.clone()),
    }
}

fn convert_update(event: MessageUpdateEvent) -> DiscordMessageUpdate {
    DiscordMessageUpdate {
        id: event.id.get(),
        channel_id: event.channel_id.get(),
        guild_id: event.guild_id.map(|id| id.get()),
        author: event.author.as_ref().map(convert_author),
        content: event.content,
        mentioned_users: event
            .mentions
            .as_deref()
            .map(convert_mentions)
            .unwrap_or_default(),
    }
}

/// REST side of the bot.
#[derive(Clone)]
pub struct SerenityDiscord {
    http: Arc<Http>,
}

impl SerenityDiscord {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DiscordService for SerenityDiscord {
    async fn send_message(&self, channel_id: Snowflake, content: &str) -> DiscordResult<()> {
        // IRC text may contain @everyone or role pings; only user mentions ping.
        let message = CreateMessage::new()
            .content(content)
            .allowed_mentions(CreateAllowedMentions::new().all_users(true));
        ChannelId::new(channel_id)
            .send_message(&self.http, message)
            .await?;
        Ok(())
    }

    async fn get_channel(&self, channel_id: Snowflake) -> DiscordResult<ChannelInfo> {
        let channel = self.http.get_channel(ChannelId::new(channel_id)).await?;
        let guild_channel = channel.guild().ok_or(DiscordError::NotFound {
            kind: "Guild channel",
            id: channel_id,
        })?;

        Ok(ChannelInfo {
            id: guild_channel.id.get(),
            name: guild_channel.name,
            parent_id: guild_channel.parent_id.map(|id| id.get()),
        })
    }

    async fn get_user(&self, user_id: Snowflake) -> DiscordResult<String> {
        let user = self.http.get_user(UserId::new(user_id)).await?;
        Ok(user.name)
    }

    async fn get_members(&self, guild_id: Snowflake, limit: u64) -> DiscordResult<Vec<MemberInfo>> {
        let members = self
            .http
            .get_guild_members(GuildId::new(guild_id), Some(limit), None)
            .await?;

        Ok(members
            .into_iter()
            .map(|member| MemberInfo {
                user_id: member.user.id.get(),
                username: member.user.name,
            })
            .collect())
    }

    async fn get_message(&self, channel_id: Snowflake, message_id: Snowflake) -> DiscordResult<String> {
        let message = self
            .http
            .get_message(ChannelId::new(channel_id), MessageId::new(message_id))
            .await?;
        Ok(message.content)
    }

    async fn get_roles(&self, guild_id: Snowflake) -> DiscordResult<HashMap<Snowflake, String>> {
        let roles = self.http.get_guild_roles(GuildId::new(guild_id)).await?;
        Ok(roles
            .into_iter()
            .map(|role| (role.id.get(), role.name))
            .collect())
    }
}

async fn build_client(
    token: &str,
    events_tx: mpsc::UnboundedSender<BridgeEvent>,
) -> anyhow::Result<Client> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS;

    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let http = HttpBuilder::new(token).client(reqwest_client).build();

    let client = serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(DiscordBotEvents { events_tx })
        .await?;
    Ok(client)
}

/// Gateway session plus its shutdown wiring.
pub struct DiscordBot {
    client: Client,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordBot {
    pub async fn build(
        token: &str,
        events_tx: mpsc::UnboundedSender<BridgeEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<Self> {
        let client = build_client(token, events_tx).await?;
        Ok(Self {
            client,
            shutdown_rx,
        })
    }

    /// REST handle sharing the gateway client's HTTP session.
    pub fn service(&self) -> SerenityDiscord {
        SerenityDiscord::new(self.client.http.clone())
    }

    /// Run the gateway until it stops or shutdown is requested.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let shard_manager = self.client.shard_manager.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        tokio::select! {
            result = self.client.start() => {
                result?;
                info!("Discord client disconnected normally");
            }
            _ = async {
                loop {
                    if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            } => {
                info!("Initiating graceful Discord shutdown...");
                shard_manager.shutdown_all().await;
                info!("Discord shutdown complete");
            }
        }
        Ok(())
    }
}
