use core::fmt;
use std::{ops::{BitAnd, BitOr, BitOrAssign}, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bot::commands::commands::BotResult;

/// Kind of inbound occurrence. Bit-flag typed so masks combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct EventType(u8);

impl EventType {
    pub const NONE: EventType = EventType(0);
    pub const CREATED: EventType = EventType(1);
    pub const UPDATED: EventType = EventType(1 << 1);
    pub const DELETED: EventType = EventType(1 << 2);
    pub const ALL: EventType = EventType(0b111);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when the two masks share at least one bit.
    pub const fn intersects(self, other: EventType) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventType {
    type Output = EventType;

    fn bitor(self, rhs: EventType) -> EventType {
        EventType(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventType {
    fn bitor_assign(&mut self, rhs: EventType) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventType {
    type Output = EventType;

    fn bitand(self, rhs: EventType) -> EventType {
        EventType(self.0 & rhs.0)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.intersects(EventType::CREATED) {
            names.push("created");
        }
        if self.intersects(EventType::UPDATED) {
            names.push("updated");
        }
        if self.intersects(EventType::DELETED) {
            names.push("deleted");
        }
        if names.is_empty() {
            return write!(f, "none");
        }
        write!(f, "{}", names.join("|"))
    }
}

#[derive(Debug, Clone)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
    pub bot: bool,
    pub member: Option<MemberContext>,
}

/// Guild-member view of the actor, absent in DMs.
#[derive(Debug, Clone, Default)]
pub struct MemberContext {
    pub nick: Option<String>,
    pub roles: Vec<String>,
}

impl ChatUser {
    pub fn display_name(&self) -> &str {
        self.member
            .as_ref()
            .and_then(|m| m.nick.as_deref())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<(String, String, bool)>,
    pub color: Option<u32>,
    pub footer: Option<String>,
}

impl RichContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push((name.into(), value.into(), inline));
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}

/// Outbound capability attached to every event by the gateway.
#[async_trait]
pub trait Reply: Send + Sync {
    async fn reply(&self, text: &str) -> BotResult<SentMessage>;
    async fn reply_structured(&self, content: RichContent) -> BotResult<SentMessage>;
}

#[derive(Clone)]
pub struct ChatEvent {
    pub kind: EventType,
    pub message_id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub user: Option<ChatUser>,
    pub message: String,
    pub received_at: DateTime<Utc>,
    pub reply: Arc<dyn Reply>,
}

impl ChatEvent {
    pub fn new(kind: EventType, channel_id: impl Into<String>, message: impl Into<String>, reply: Arc<dyn Reply>) -> Self {
        Self {
            kind,
            message_id: String::new(),
            channel_id: channel_id.into(),
            guild_id: None,
            user: None,
            message: message.into(),
            received_at: Utc::now(),
            reply,
        }
    }

    pub fn with_user(mut self, user: ChatUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    /// Whitespace-tokenized view of the message text.
    pub fn args(&self) -> Vec<&str> {
        self.message.split_whitespace().collect()
    }

    pub fn is_dm(&self) -> bool {
        self.guild_id.is_none()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub async fn reply(&self, text: &str) -> BotResult<SentMessage> {
        self.reply.reply(text).await
    }

    pub async fn reply_structured(&self, content: RichContent) -> BotResult<SentMessage> {
        self.reply.reply_structured(content).await
    }
}

impl fmt::Debug for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatEvent")
            .field("kind", &self.kind)
            .field("message_id", &self.message_id)
            .field("channel_id", &self.channel_id)
            .field("guild_id", &self.guild_id)
            .field("user", &self.user)
            .field("message", &self.message)
            .field("received_at", &self.received_at)
            .finish_non_exhaustive()
    }
}

/// Key for the interactive session of `user` in `channel`.
pub fn session_key(channel_id: &str, user_id: &str) -> String {
    format!("{channel_id}:{user_id}")
}
