//! Mention resolution in both directions.
//!
//! IRC -> Discord: `@name` tokens are looked up in the [`MemberDirectory`],
//! built once from the guild member listing when Discord becomes ready.
//!
//! Discord -> IRC: mention ids are resolved to names in batches, one lookup
//! per id against the Discord service, preserving input order.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::common::types::{MemberInfo, MentionKind, MentionedUser, Snowflake};
use crate::discord::service::DiscordService;

/// Members fetched at startup.
pub const MEMBER_LISTING_LIMIT: u64 = 1000;

/// Case-sensitive username -> user id map that remembers insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemberDirectory {
    order: Vec<String>,
    ids: HashMap<String, Snowflake>,
}

impl MemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a member. An existing name keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, id: Snowflake) {
        let name = name.into();
        if self.ids.insert(name.clone(), id).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Snowflake> {
        self.ids.get(name).copied()
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Resolves mentions using the member directory and Discord lookups.
#[derive(Debug, Clone, Default)]
pub struct MentionResolver {
    directory: MemberDirectory,
}

impl MentionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(&self) -> &MemberDirectory {
        &self.directory
    }

    /// Fill the directory from a guild member listing.
    pub fn populate(&mut self, members: impl IntoIterator<Item = MemberInfo>) {
        for member in members {
            self.directory.insert(member.username, member.user_id);
        }
        debug!("Member directory holds {} names", self.directory.len());
    }

    /// Resolve an IRC `@name` token (with or without the `@` and quotes).
    pub fn resolve(&self, token: &str) -> Option<Snowflake> {
        let name = token.strip_prefix('@').unwrap_or(token);
        let name = name
            .strip_prefix('"')
            .and_then(|n| n.strip_suffix('"'))
            .unwrap_or(name);
        self.directory.get(name)
    }

    /// Resolve a batch of mention ids to names, in input order.
    ///
    /// Users already carried on the message (`known_users`) need no lookup.
    /// A failed lookup yields `None` for that entry only.
    pub async fn resolve_many(
        &self,
        service: &dyn DiscordService,
        guild_id: Snowflake,
        ids: &[Snowflake],
        kind: MentionKind,
        known_users: &[MentionedUser],
    ) -> Vec<Option<String>> {
        if ids.is_empty() {
            return Vec::new();
        }

        match kind {
            MentionKind::User => {
                join_all(ids.iter().map(|&id| async move {
                    if let Some(user) = known_users.iter().find(|u| u.id == id) {
                        return Some(user.name.clone());
                    }
                    match service.get_user(id).await {
                        Ok(name) => Some(name),
                        Err(e) => {
                            warn!("Could not resolve user {}: {}", id, e);
                            None
                        }
                    }
                }))
                .await
            }
            MentionKind::Channel => {
                join_all(ids.iter().map(|&id| async move {
                    match service.get_channel(id).await {
                        Ok(channel) => Some(channel.name),
                        Err(e) => {
                            warn!("Could not resolve channel {}: {}", id, e);
                            None
                        }
                    }
                }))
                .await
            }
            MentionKind::Role => match service.get_roles(guild_id).await {
                Ok(roles) => ids.iter().map(|id| roles.get(id).cloned()).collect(),
                Err(e) => {
                    warn!("Could not fetch roles for guild {}: {}", guild_id, e);
                    vec![None; ids.len()]
                }
            },
        }
    }

    /// The `listnicks` reply: every known Discord name, quoted when needed.
    pub fn list_nicks(&self) -> String {
        if self.directory.is_empty() {
            return "Discord users: (none)".to_string();
        }

        let names: Vec<String> = self
            .directory
            .names()
            .map(|name| {
                if name.contains(' ') || name.contains(',') {
                    format!("@\"{}\"", name)
                } else {
                    format!("@{}", name)
                }
            })
            .collect();

        format!("Discord users: {}", names.join(" "))
    }
}
