//! Bridge orchestrator that ties IRC and Discord together.
//!
//! Events from both sides arrive on one queue and are handled one at a time:
//! self-echo suppression, channel and thread scoping, prefixed commands, then
//! formatting and relay. A failed handler drops only that relay.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::common::types::{IrcSource, MentionKind, MentionedUser, Snowflake};
use crate::common::{
    BridgeCommand, BridgeEvent, DiscordEvent, DiscordMessage, DiscordMessageUpdate, IrcEvent,
    MessageSnapshot,
};
use crate::config::Config;
use crate::discord::commands::parse_command;
use crate::discord::resolver::{MentionResolver, MEMBER_LISTING_LIMIT};
use crate::discord::service::DiscordService;
use crate::ircnet::service::IrcService;

use super::attachments::AttachmentDispatcher;
use super::cache::RecentMessageCache;
use super::filter::{FilterDirection, MessageFilter};
use super::formatter::{truncate, Formatter, ResolvedMentions};

pub const CONNECTED_NOTICE: &str = "Bridge connected to IRC and registered via SASL.";
pub const FAREWELL: &str = "Goodbye, cruel world! (jk, caught a SIGINT, bbl)";

const THREAD_NAME_MAX: usize = 10;
const REPLY_QUOTE_MAX: usize = 20;
const EDIT_QUOTE_MAX: usize = 30;

/// Where a Discord message was posted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    BridgeChannel,
    Thread(String),
}

/// The main bridge that routes events between IRC and Discord.
pub struct Bridge {
    config: Config,
    discord: Arc<dyn DiscordService>,
    irc: Arc<dyn IrcService>,
    formatter: Formatter,
    resolver: MentionResolver,
    cache: RecentMessageCache,
    attachments: AttachmentDispatcher,
    filter: MessageFilter,
    /// Our own Discord user, known once the gateway is ready.
    bot_id: Option<Snowflake>,
    announced_connect: bool,
}

impl Bridge {
    pub fn new(config: Config, discord: Arc<dyn DiscordService>, irc: Arc<dyn IrcService>) -> Self {
        let filter = MessageFilter::from_config(&config);
        if filter.pattern_count() > 0 {
            info!("Message filters enabled ({} patterns)", filter.pattern_count());
        }

        Self {
            config,
            discord,
            irc,
            formatter: Formatter::new(),
            resolver: MentionResolver::new(),
            cache: RecentMessageCache::default(),
            attachments: AttachmentDispatcher::new(),
            filter,
            bot_id: None,
            announced_connect: false,
        }
    }

    /// Drain events until the queue closes or shutdown is signalled.
    pub async fn run(
        mut self,
        mut events_rx: mpsc::UnboundedReceiver<BridgeEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    match event {
                        Some(event) => {
                            if let Err(e) = self.handle_event(event).await {
                                error!("Failed to relay event: {:#}", e);
                            }
                        }
                        None => {
                            debug!("Bridge event channel closed");
                            break;
                        }
                    }
                }

                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, saying goodbye");
                        self.farewell().await;
                        break;
                    }
                }
            }
        }
        info!("Bridge task ended");
    }

    pub async fn handle_event(&mut self, event: BridgeEvent) -> Result<()> {
        match event {
            BridgeEvent::Irc(event) => self.handle_irc_event(event).await,
            BridgeEvent::Discord(event) => self.handle_discord_event(event).await,
        }
    }

    /// Best-effort goodbye on both sides.
    pub async fn farewell(&self) {
        if let Err(e) = self
            .discord
            .send_message(self.config.discord_bridge_channel, FAREWELL)
            .await
        {
            warn!("Failed to send farewell to Discord: {}", e);
        }
        if let Err(e) = self.irc.privmsg(&self.config.irc_channel, FAREWELL) {
            warn!("Failed to send farewell to IRC: {}", e);
        }
    }

    // ---- IRC -> Discord ----

    async fn handle_irc_event(&mut self, event: IrcEvent) -> Result<()> {
        match event {
            IrcEvent::Registered => {
                if !self.announced_connect {
                    self.announced_connect = true;
                    self.send_discord(CONNECTED_NOTICE).await?;
                }
                info!("Joining {}", self.config.irc_channel);
                self.irc
                    .join(&self.config.irc_channel, self.config.irc_channel_key())?;
            }
            IrcEvent::Privmsg {
                source,
                target,
                text,
            } => {
                if self.is_self(source.as_ref()) || !self.is_bridge_channel(&target) {
                    return Ok(());
                }

                if let Some(BridgeCommand::ListNicks) = parse_command(&self.config.prefix, &text) {
                    debug!("listnicks requested from IRC");
                    self.irc
                        .privmsg(&self.config.irc_channel, &self.resolver.list_nicks())?;
                    return Ok(());
                }

                if text.trim().is_empty() {
                    return Ok(());
                }

                let line = format!(
                    "<{}> {}",
                    nick_or(source.as_ref(), "User"),
                    self.formatter.irc_to_discord(&text, &self.resolver)
                );
                self.relay_to_discord(&line).await?;
            }
            IrcEvent::Action {
                source,
                target,
                text,
            } => {
                if self.is_self(source.as_ref()) || !self.is_bridge_channel(&target) {
                    return Ok(());
                }
                let line = format!(
                    "*** * {} {}",
                    nick_or(source.as_ref(), "User"),
                    self.formatter.irc_to_discord(&text, &self.resolver)
                );
                self.relay_to_discord(&line).await?;
            }
            IrcEvent::Join { source, channel } => {
                if !self.is_bridge_channel(&channel) {
                    return Ok(());
                }
                if self.is_self(source.as_ref()) {
                    let notice = format!("*** Bridge joined {}", self.config.irc_channel);
                    self.send_discord(&notice).await?;
                } else {
                    let notice =
                        format!("*** {} joined the channel", nick_or(source.as_ref(), "Someone"));
                    self.send_discord(&notice).await?;
                }
            }
            IrcEvent::Part {
                source,
                channel,
                reason,
            } => {
                if self.is_self(source.as_ref()) || !self.is_bridge_channel(&channel) {
                    return Ok(());
                }
                let notice = with_reason(
                    format!("*** {} has left", nick_or(source.as_ref(), "Someone")),
                    reason.as_deref(),
                );
                self.send_discord(&notice).await?;
            }
            IrcEvent::Quit { source, reason } => {
                if self.is_self(source.as_ref()) {
                    return Ok(());
                }
                let notice = with_reason(
                    format!("*** {} has quit", nick_or(source.as_ref(), "Someone")),
                    reason.as_deref(),
                );
                self.send_discord(&notice).await?;
            }
            IrcEvent::Nick { source, new_nick } => {
                if self.is_self(source.as_ref()) {
                    return Ok(());
                }
                let notice = format!(
                    "*** {} is now known as {}",
                    nick_or(source.as_ref(), "Someone"),
                    new_nick
                );
                self.send_discord(&notice).await?;
            }
            IrcEvent::Names { channel, names } => {
                if !self.is_bridge_channel(&channel) {
                    return Ok(());
                }
                let content = format!("Users in **{}**: {}", channel, names.join(", "));
                self.send_discord(&content).await?;
            }
            IrcEvent::Raw { line } => {
                if self.config.log_all_messages {
                    info!("[IRC] {}", line);
                }
            }
        }
        Ok(())
    }

    fn is_self(&self, source: Option<&IrcSource>) -> bool {
        source.is_some_and(|s| s.is(&self.config.irc_user))
    }

    fn is_bridge_channel(&self, channel: &str) -> bool {
        channel.eq_ignore_ascii_case(&self.config.irc_channel)
    }

    async fn send_discord(&self, content: &str) -> Result<()> {
        self.discord
            .send_message(self.config.discord_bridge_channel, content)
            .await?;
        Ok(())
    }

    async fn relay_to_discord(&self, line: &str) -> Result<()> {
        if let Some(pattern) = self.filter.blocking_pattern(FilterDirection::IrcToDiscord, line) {
            info!("Filtered IRC -> Discord by '{}': {}", pattern, line);
            return Ok(());
        }
        info!("IRC -> Discord: {}", line);
        self.send_discord(line).await
    }

    // ---- Discord -> IRC ----

    async fn handle_discord_event(&mut self, event: DiscordEvent) -> Result<()> {
        match event {
            DiscordEvent::Ready { bot_id } => {
                self.bot_id = Some(bot_id);
                let members = self
                    .discord
                    .get_members(self.config.discord_bridge_server, MEMBER_LISTING_LIMIT)
                    .await?;
                self.resolver.populate(members);
                info!(
                    "Discord side ready, {} members known",
                    self.resolver.directory().len()
                );
                Ok(())
            }
            DiscordEvent::MessageCreate(message) => self.handle_message_create(message).await,
            DiscordEvent::MessageUpdate(update) => self.handle_message_update(update).await,
        }
    }

    /// Where a Discord channel sits relative to the bridge, `None` when out of scope.
    async fn bridge_scope(&self, channel_id: Snowflake) -> Result<Option<Scope>> {
        if channel_id == self.config.discord_bridge_channel {
            return Ok(Some(Scope::BridgeChannel));
        }

        let channel = self.discord.get_channel(channel_id).await?;
        if channel.parent_id != Some(self.config.discord_bridge_channel) {
            debug!("Ignoring message from unbridged channel {}", channel_id);
            return Ok(None);
        }

        let name = if channel.name.is_empty() {
            "Thread".to_string()
        } else {
            channel.name
        };
        Ok(Some(Scope::Thread(name)))
    }

    fn is_own_message(&self, author_id: Snowflake) -> bool {
        self.bot_id == Some(author_id)
    }

    async fn handle_message_create(&mut self, message: DiscordMessage) -> Result<()> {
        let Some(guild_id) = message.guild_id else {
            return Ok(());
        };
        if self.is_own_message(message.author.id) {
            return Ok(());
        }
        let Some(scope) = self.bridge_scope(message.channel_id).await? else {
            return Ok(());
        };

        self.cache.put(message.id, MessageSnapshot::from(&message));

        if let Some(BridgeCommand::ListNicks) = parse_command(&self.config.prefix, &message.content) {
            debug!("listnicks requested from Discord");
            self.irc.names(&self.config.irc_channel)?;
            return Ok(());
        }

        let author = message.author.name.clone();

        if !message.content.trim().is_empty() {
            let quote = match message.reply_to {
                Some(reply_to) => self.quoted_content(&message, reply_to).await,
                None => None,
            };

            let mut prelude = format!("<{}>", author);
            if let Scope::Thread(thread) = &scope {
                prelude.push_str(&format!(" [in \"{}\"]", truncate(thread, THREAD_NAME_MAX)));
            }
            if let Some(quote) = quote.filter(|q| !q.is_empty()) {
                prelude.push_str(&format!(" [> {}]", truncate(&quote, REPLY_QUOTE_MAX)));
            }

            let text = self
                .to_irc_text(guild_id, &message.content, &message.mentioned_users)
                .await;
            self.relay_to_irc(&format!("{} {}", prelude, text))?;
        }

        if !message.attachments.is_empty() {
            let sends = self
                .attachments
                .schedule(&message.attachments, |a| format!("{} sent {}", author, a.url));
            debug!("Scheduling {} attachment lines", sends.len());
            self.attachments
                .dispatch(Arc::clone(&self.irc), &self.config.irc_channel, sends);
        }

        Ok(())
    }

    /// Content of the replied-to message: from the event, the cache, then the API.
    async fn quoted_content(&mut self, message: &DiscordMessage, reply_to: Snowflake) -> Option<String> {
        if let Some(content) = &message.reply_content {
            return Some(content.clone());
        }
        if let Some(snapshot) = self.cache.get(reply_to) {
            return Some(snapshot.content.clone());
        }
        match self.discord.get_message(message.channel_id, reply_to).await {
            Ok(content) => Some(content),
            Err(e) => {
                warn!("Could not fetch replied-to message {}: {}", reply_to, e);
                None
            }
        }
    }

    async fn handle_message_update(&mut self, update: DiscordMessageUpdate) -> Result<()> {
        let Some(guild_id) = update.guild_id else {
            return Ok(());
        };
        if update.author.as_ref().is_some_and(|a| self.is_own_message(a.id)) {
            return Ok(());
        }
        let Some(content) = update.content else {
            return Ok(());
        };
        // Cheap check first: scoping may cost a channel lookup.
        if !self.cache.contains(update.id) {
            debug!("Edit of uncached message {}, skipping", update.id);
            return Ok(());
        }
        if self.bridge_scope(update.channel_id).await?.is_none() {
            return Ok(());
        }

        // Edit events may omit the author; fall back to the cached one.
        let author = match update.author {
            Some(author) => author.name,
            None => self
                .cache
                .get(update.id)
                .map(|snapshot| snapshot.author.clone())
                .unwrap_or_default(),
        };

        // Read and overwrite in one step, before any await.
        let snapshot = MessageSnapshot::new(content.clone(), author.clone());
        let Some(previous) = self.cache.replace(update.id, snapshot) else {
            return Ok(());
        };

        if previous.content == content {
            return Ok(());
        }

        let text = self
            .to_irc_text(guild_id, &content, &update.mentioned_users)
            .await;
        let line = format!(
            "<{}> [edit > {}] {}",
            author,
            truncate(&previous.content, EDIT_QUOTE_MAX),
            text
        );
        self.relay_to_irc(&line)?;
        Ok(())
    }

    /// Resolve mentions as a batch, then format.
    async fn to_irc_text(
        &self,
        guild_id: Snowflake,
        content: &str,
        known_users: &[MentionedUser],
    ) -> String {
        let ids = self.formatter.collect_mentions(content);
        let resolved = if ids.is_empty() {
            ResolvedMentions::default()
        } else {
            let service = self.discord.as_ref();
            let (users, channels, roles) = futures::join!(
                self.resolver
                    .resolve_many(service, guild_id, &ids.users, MentionKind::User, known_users),
                self.resolver
                    .resolve_many(service, guild_id, &ids.channels, MentionKind::Channel, &[]),
                self.resolver
                    .resolve_many(service, guild_id, &ids.roles, MentionKind::Role, &[]),
            );
            ResolvedMentions {
                users,
                channels,
                roles,
            }
        };

        self.formatter.discord_to_irc(content, &resolved)
    }

    fn relay_to_irc(&self, line: &str) -> Result<()> {
        if let Some(pattern) = self.filter.blocking_pattern(FilterDirection::DiscordToIrc, line) {
            info!("Filtered Discord -> IRC by '{}': {}", pattern, line);
            return Ok(());
        }
        info!("Discord -> IRC: {}", line);
        self.irc.privmsg(&self.config.irc_channel, line)?;
        Ok(())
    }
}

fn nick_or<'a>(source: Option<&'a IrcSource>, fallback: &'a str) -> &'a str {
    source.map(|s| s.nick.as_str()).unwrap_or(fallback)
}

fn with_reason(notice: String, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("{} ({})", notice, reason),
        None => notice,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bridge::testing::{FakeDiscord, FakeIrc, IrcCall};
    use crate::common::types::{Attachment, DiscordAuthor};
    use crate::config::types::make_test_config;

    const BRIDGE_CHANNEL: Snowflake = 1000;
    const GUILD: Snowflake = 2000;
    const BOT_ID: Snowflake = 1;

    fn bridge_with(discord: FakeDiscord, config: Config) -> (Bridge, Arc<FakeDiscord>, Arc<FakeIrc>) {
        let discord = Arc::new(discord);
        let irc = Arc::new(FakeIrc::default());
        let bridge = Bridge::new(config, discord.clone(), irc.clone());
        (bridge, discord, irc)
    }

    fn bridge(discord: FakeDiscord) -> (Bridge, Arc<FakeDiscord>, Arc<FakeIrc>) {
        bridge_with(discord, make_test_config())
    }

    fn from(nick: &str) -> Option<IrcSource> {
        Some(IrcSource::new(nick))
    }

    fn privmsg(nick: &str, text: &str) -> BridgeEvent {
        BridgeEvent::Irc(IrcEvent::Privmsg {
            source: from(nick),
            target: "##bridge".to_string(),
            text: text.to_string(),
        })
    }

    fn message(id: Snowflake, author: &str, content: &str) -> DiscordMessage {
        DiscordMessage {
            id,
            channel_id: BRIDGE_CHANNEL,
            guild_id: Some(GUILD),
            author: DiscordAuthor {
                id: 10,
                name: author.to_string(),
                bot: false,
            },
            content: content.to_string(),
            attachments: Vec::new(),
            mentioned_users: Vec::new(),
            reply_to: None,
            reply_content: None,
        }
    }

    fn create(message: DiscordMessage) -> BridgeEvent {
        BridgeEvent::Discord(DiscordEvent::MessageCreate(message))
    }

    fn edit(id: Snowflake, author: &str, content: &str) -> BridgeEvent {
        BridgeEvent::Discord(DiscordEvent::MessageUpdate(DiscordMessageUpdate {
            id,
            channel_id: BRIDGE_CHANNEL,
            guild_id: Some(GUILD),
            author: Some(DiscordAuthor {
                id: 10,
                name: author.to_string(),
                bot: false,
            }),
            content: Some(content.to_string()),
            mentioned_users: Vec::new(),
        }))
    }

    fn ready() -> BridgeEvent {
        BridgeEvent::Discord(DiscordEvent::Ready { bot_id: BOT_ID })
    }

    // ---- IRC -> Discord ----

    #[tokio::test]
    async fn test_irc_message_relayed_with_formatting() {
        let (mut bridge, discord, _irc) = bridge(FakeDiscord::default());

        bridge
            .handle_event(privmsg("alice", "hello \x02world\x02"))
            .await
            .unwrap();

        assert_eq!(discord.sent(), vec![(BRIDGE_CHANNEL, "<alice> hello **world**".to_string())]);
    }

    #[tokio::test]
    async fn test_irc_tags_become_discord_mentions() {
        let (mut bridge, discord, _irc) =
            bridge(FakeDiscord::default().with_member(456, "alice"));
        bridge.handle_event(ready()).await.unwrap();

        bridge
            .handle_event(privmsg("bob", "@alice: look @nobody"))
            .await
            .unwrap();

        assert_eq!(discord.sent_texts(), vec!["<bob> <@456>: look @nobody"]);
    }

    #[tokio::test]
    async fn test_own_irc_messages_never_reach_discord() {
        let (mut bridge, discord, _irc) = bridge(FakeDiscord::default());

        bridge.handle_event(privmsg("BridgeBot", "echo")).await.unwrap();
        bridge.handle_event(privmsg("bridgebot", "echo")).await.unwrap();
        bridge
            .handle_event(BridgeEvent::Irc(IrcEvent::Action {
                source: from("BridgeBot"),
                target: "##bridge".to_string(),
                text: "waves".to_string(),
            }))
            .await
            .unwrap();
        bridge
            .handle_event(BridgeEvent::Irc(IrcEvent::Part {
                source: from("BridgeBot"),
                channel: "##bridge".to_string(),
                reason: None,
            }))
            .await
            .unwrap();

        assert!(discord.sent().is_empty());
    }

    #[tokio::test]
    async fn test_irc_scoping_and_blank_lines() {
        let (mut bridge, discord, _irc) = bridge(FakeDiscord::default());

        bridge
            .handle_event(BridgeEvent::Irc(IrcEvent::Privmsg {
                source: from("alice"),
                target: "BridgeBot".to_string(),
                text: "private".to_string(),
            }))
            .await
            .unwrap();
        bridge
            .handle_event(BridgeEvent::Irc(IrcEvent::Privmsg {
                source: from("alice"),
                target: "#elsewhere".to_string(),
                text: "hi".to_string(),
            }))
            .await
            .unwrap();
        bridge.handle_event(privmsg("alice", "   ")).await.unwrap();
        assert!(discord.sent().is_empty());

        // Channel names compare case-insensitively.
        bridge
            .handle_event(BridgeEvent::Irc(IrcEvent::Privmsg {
                source: from("alice"),
                target: "##Bridge".to_string(),
                text: "hi".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(discord.sent_texts(), vec!["<alice> hi"]);
    }

    #[tokio::test]
    async fn test_listnicks_from_irc() {
        let discord = FakeDiscord::default()
            .with_member(123, "Bob Smith")
            .with_member(456, "alice");
        let (mut bridge, discord, irc) = bridge(discord);
        bridge.handle_event(ready()).await.unwrap();

        bridge.handle_event(privmsg("carol", "$listnicks")).await.unwrap();

        assert_eq!(
            irc.calls(),
            vec![IrcCall::Privmsg(
                "##bridge".to_string(),
                "Discord users: @\"Bob Smith\" @alice".to_string()
            )]
        );
        assert!(discord.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_prefixed_text_is_relayed() {
        let (mut bridge, discord, irc) = bridge(FakeDiscord::default());

        bridge.handle_event(privmsg("carol", "$weather")).await.unwrap();

        assert_eq!(discord.sent_texts(), vec!["<carol> $weather"]);
        assert!(irc.calls().is_empty());
    }

    #[tokio::test]
    async fn test_registration_announces_once_and_joins() {
        let mut config = make_test_config();
        config.irc_channel_password = Some("sekrit".to_string());
        let (mut bridge, discord, irc) = bridge_with(FakeDiscord::default(), config);

        bridge.handle_event(BridgeEvent::Irc(IrcEvent::Registered)).await.unwrap();
        bridge.handle_event(BridgeEvent::Irc(IrcEvent::Registered)).await.unwrap();

        assert_eq!(discord.sent_texts(), vec![CONNECTED_NOTICE]);
        assert_eq!(
            irc.calls(),
            vec![
                IrcCall::Join("##bridge".to_string(), Some("sekrit".to_string())),
                IrcCall::Join("##bridge".to_string(), Some("sekrit".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_membership_notices() {
        let (mut bridge, discord, _irc) = bridge(FakeDiscord::default());
        let events = vec![
            IrcEvent::Join {
                source: from("BridgeBot"),
                channel: "##bridge".to_string(),
            },
            IrcEvent::Join {
                source: from("alice"),
                channel: "##bridge".to_string(),
            },
            IrcEvent::Action {
                source: from("alice"),
                target: "##bridge".to_string(),
                text: "waves".to_string(),
            },
            IrcEvent::Part {
                source: from("alice"),
                channel: "##bridge".to_string(),
                reason: None,
            },
            IrcEvent::Quit {
                source: from("bob"),
                reason: Some("Ping timeout".to_string()),
            },
            IrcEvent::Nick {
                source: from("carol"),
                new_nick: "caroline".to_string(),
            },
            IrcEvent::Names {
                channel: "##bridge".to_string(),
                names: vec!["BridgeBot".to_string(), "alice".to_string()],
            },
        ];

        for event in events {
            bridge.handle_event(BridgeEvent::Irc(event)).await.unwrap();
        }

        assert_eq!(
            discord.sent_texts(),
            vec![
                "*** Bridge joined ##bridge",
                "*** alice joined the channel",
                "*** * alice waves",
                "*** alice has left",
                "*** bob has quit (Ping timeout)",
                "*** carol is now known as caroline",
                "Users in **##bridge**: BridgeBot, alice",
            ]
        );
    }

    #[tokio::test]
    async fn test_irc_to_discord_filter() {
        let mut config = make_test_config();
        config.irc_to_discord_filters = Some(vec!["^<\\w+> !".to_string()]);
        let (mut bridge, discord, _irc) = bridge_with(FakeDiscord::default(), config);

        bridge.handle_event(privmsg("alice", "!seen bob")).await.unwrap();
        bridge.handle_event(privmsg("alice", "hi")).await.unwrap();

        assert_eq!(discord.sent_texts(), vec!["<alice> hi"]);
    }

    // ---- Discord -> IRC ----

    #[tokio::test]
    async fn test_discord_message_relayed() {
        let (mut bridge, _discord, irc) = bridge(FakeDiscord::default());

        bridge
            .handle_event(create(message(1, "alice", "hello **there**\nfriend")))
            .await
            .unwrap();

        assert_eq!(irc.privmsgs(), vec!["<alice> hello \x02there\x02 / friend"]);
    }

    #[tokio::test]
    async fn test_discord_mentions_resolved() {
        let (mut bridge, _discord, irc) = bridge(
            FakeDiscord::default()
                .with_channel(77, "general", None)
                .with_role(5, "Mods"),
        );
        let mut msg = message(1, "bob", "<@456> see <#77> <@&5> <@999>");
        msg.mentioned_users = vec![MentionedUser {
            id: 456,
            name: "alice".to_string(),
        }];

        bridge.handle_event(create(msg)).await.unwrap();

        assert_eq!(
            irc.privmsgs(),
            vec!["<bob> @alice see #general @[Role](Mods) @UnknownUser"]
        );
    }

    #[tokio::test]
    async fn test_own_and_direct_messages_ignored() {
        let (mut bridge, _discord, irc) = bridge(FakeDiscord::default());
        bridge.handle_event(ready()).await.unwrap();

        let mut own = message(1, "ircord", "relayed line");
        own.author.id = BOT_ID;
        bridge.handle_event(create(own)).await.unwrap();

        let mut dm = message(2, "alice", "psst");
        dm.guild_id = None;
        bridge.handle_event(create(dm)).await.unwrap();

        assert!(irc.calls().is_empty());
    }

    #[tokio::test]
    async fn test_other_bots_are_relayed() {
        let (mut bridge, _discord, irc) = bridge(FakeDiscord::default());
        bridge.handle_event(ready()).await.unwrap();

        let mut msg = message(1, "otherbot", "beep");
        msg.author.id = 99;
        msg.author.bot = true;
        bridge.handle_event(create(msg)).await.unwrap();

        assert_eq!(irc.privmsgs(), vec!["<otherbot> beep"]);
    }

    #[tokio::test]
    async fn test_thread_messages_tagged_and_other_channels_ignored() {
        let discord = FakeDiscord::default()
            .with_channel(50, "a very long thread title", Some(BRIDGE_CHANNEL))
            .with_channel(60, "random", Some(4242));
        let (mut bridge, _discord, irc) = bridge(discord);

        let mut in_thread = message(1, "alice", "hi");
        in_thread.channel_id = 50;
        bridge.handle_event(create(in_thread)).await.unwrap();

        let mut elsewhere = message(2, "alice", "hi");
        elsewhere.channel_id = 60;
        bridge.handle_event(create(elsewhere)).await.unwrap();

        assert_eq!(irc.privmsgs(), vec!["<alice> [in \"a very lon…\"] hi"]);
    }

    #[tokio::test]
    async fn test_reply_quotes() {
        let (mut bridge, _discord, irc) =
            bridge(FakeDiscord::default().with_message(300, "fetched from the api"));

        // Carried by the event.
        let mut reply = message(2, "bob", "agreed");
        reply.reply_to = Some(1);
        reply.reply_content = Some("the original message text".to_string());
        bridge.handle_event(create(reply)).await.unwrap();

        // From the cache.
        bridge.handle_event(create(message(10, "alice", "cached"))).await.unwrap();
        let mut reply = message(11, "bob", "yes");
        reply.reply_to = Some(10);
        bridge.handle_event(create(reply)).await.unwrap();

        // From the API.
        let mut reply = message(12, "bob", "old news");
        reply.reply_to = Some(300);
        bridge.handle_event(create(reply)).await.unwrap();

        assert_eq!(
            irc.privmsgs(),
            vec![
                "<bob> [> the original message…] agreed",
                "<alice> cached",
                "<bob> [> cached] yes",
                "<bob> [> fetched from the api] old news",
            ]
        );
    }

    #[tokio::test]
    async fn test_listnicks_from_discord_requests_names() {
        let (mut bridge, _discord, irc) = bridge(FakeDiscord::default());

        bridge.handle_event(create(message(1, "alice", "$listnicks"))).await.unwrap();

        assert_eq!(irc.calls(), vec![IrcCall::Names("##bridge".to_string())]);
    }

    #[tokio::test]
    async fn test_edit_of_uncached_message_is_silent() {
        let (mut bridge, _discord, irc) = bridge(FakeDiscord::default());

        bridge.handle_event(edit(42, "alice", "changed")).await.unwrap();

        assert!(irc.calls().is_empty());
    }

    #[tokio::test]
    async fn test_uncached_edit_elsewhere_skips_channel_lookup() {
        let (mut bridge, discord, irc) = bridge(FakeDiscord::default());

        let mut update = DiscordMessageUpdate {
            id: 42,
            channel_id: 555,
            guild_id: Some(GUILD),
            author: None,
            content: Some("embed resolved".to_string()),
            mentioned_users: Vec::new(),
        };
        bridge
            .handle_event(BridgeEvent::Discord(DiscordEvent::MessageUpdate(update.clone())))
            .await
            .unwrap();
        update.id = 43;
        bridge
            .handle_event(BridgeEvent::Discord(DiscordEvent::MessageUpdate(update)))
            .await
            .unwrap();

        assert!(discord.channel_lookups.lock().unwrap().is_empty());
        assert!(irc.calls().is_empty());
    }

    #[tokio::test]
    async fn test_edit_quotes_pre_edit_content() {
        let (mut bridge, _discord, irc) = bridge(FakeDiscord::default());

        bridge.handle_event(create(message(7, "alice", "helo world"))).await.unwrap();
        bridge.handle_event(edit(7, "alice", "hello world")).await.unwrap();
        bridge.handle_event(edit(7, "alice", "hello world!")).await.unwrap();

        assert_eq!(
            irc.privmsgs(),
            vec![
                "<alice> helo world",
                "<alice> [edit > helo world] hello world",
                "<alice> [edit > hello world] hello world!",
            ]
        );
    }

    #[tokio::test]
    async fn test_edit_without_change_or_content_is_silent() {
        let (mut bridge, _discord, irc) = bridge(FakeDiscord::default());
        bridge.handle_event(create(message(7, "alice", "same"))).await.unwrap();

        bridge.handle_event(edit(7, "alice", "same")).await.unwrap();
        bridge
            .handle_event(BridgeEvent::Discord(DiscordEvent::MessageUpdate(
                DiscordMessageUpdate {
                    id: 7,
                    channel_id: BRIDGE_CHANNEL,
                    guild_id: Some(GUILD),
                    author: None,
                    content: None,
                    mentioned_users: Vec::new(),
                },
            )))
            .await
            .unwrap();

        assert_eq!(irc.privmsgs(), vec!["<alice> same"]);
    }

    #[tokio::test]
    async fn test_edit_without_author_uses_cached_author() {
        let (mut bridge, _discord, irc) = bridge(FakeDiscord::default());
        bridge.handle_event(create(message(7, "alice", "first"))).await.unwrap();

        bridge
            .handle_event(BridgeEvent::Discord(DiscordEvent::MessageUpdate(
                DiscordMessageUpdate {
                    id: 7,
                    channel_id: BRIDGE_CHANNEL,
                    guild_id: Some(GUILD),
                    author: None,
                    content: Some("second".to_string()),
                    mentioned_users: Vec::new(),
                },
            )))
            .await
            .unwrap();
        bridge.handle_event(edit(7, "alice", "third")).await.unwrap();

        assert_eq!(
            irc.privmsgs(),
            vec![
                "<alice> first",
                "<alice> [edit > first] second",
                "<alice> [edit > second] third",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_attachments_sent_spaced() {
        let (mut bridge, _discord, irc) = bridge(FakeDiscord::default());
        let mut msg = message(1, "alice", "");
        msg.attachments = (0..5)
            .map(|i| Attachment {
                url: format!("https://cdn.example.com/{}.png", i),
                filename: format!("{}.png", i),
            })
            .collect();

        bridge.handle_event(create(msg)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(irc.privmsgs(), vec!["alice sent https://cdn.example.com/0.png"]);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let sent = irc.privmsgs();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[4], "alice sent https://cdn.example.com/4.png");
    }

    #[tokio::test]
    async fn test_discord_to_irc_filter() {
        let mut config = make_test_config();
        config.discord_to_irc_filters = Some(vec!["(?i)free nitro".to_string()]);
        let (mut bridge, _discord, irc) = bridge_with(FakeDiscord::default(), config);

        bridge
            .handle_event(create(message(1, "spammer", "FREE NITRO here")))
            .await
            .unwrap();
        bridge
            .handle_event(create(message(3, "spammer", "**free** nitro")))
            .await
            .unwrap();
        bridge.handle_event(create(message(2, "alice", "hi"))).await.unwrap();

        assert_eq!(irc.privmsgs(), vec!["<alice> hi"]);
    }

    // ---- Run loop ----

    #[tokio::test]
    async fn test_failed_event_does_not_stop_the_loop() {
        let (bridge, _discord, irc) = bridge(FakeDiscord::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        // Channel 555 is unknown, so scoping fails.
        let mut broken = message(1, "alice", "lost");
        broken.channel_id = 555;
        events_tx.send(create(broken)).unwrap();
        events_tx.send(create(message(2, "alice", "kept"))).unwrap();
        drop(events_tx);

        bridge.run(events_rx, shutdown_rx).await;

        assert_eq!(irc.privmsgs(), vec!["<alice> kept"]);
    }

    #[tokio::test]
    async fn test_unclosed_markdown_does_not_stop_the_loop() {
        let (bridge, _discord, irc) = bridge(FakeDiscord::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        events_tx.send(create(message(1, "alice", &"_x\n".repeat(666)))).unwrap();
        events_tx.send(create(message(2, "alice", "after"))).unwrap();
        drop(events_tx);

        tokio::spawn(bridge.run(events_rx, shutdown_rx)).await.unwrap();

        let sent = irc.privmsgs();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], "<alice> after");
    }

    #[tokio::test]
    async fn test_shutdown_sends_farewell_to_both_sides() {
        let (bridge, discord, irc) = bridge(FakeDiscord::default());
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(bridge.run(events_rx, shutdown_rx));
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(discord.sent(), vec![(BRIDGE_CHANNEL, FAREWELL.to_string())]);
        assert_eq!(irc.privmsgs(), vec![FAREWELL]);
    }
}
