use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{Cache, ChannelId, Client, CreateEmbed, CreateEmbedFooter, CreateMessage, GatewayIntents, Http, Message, UserId};
use tokio::sync::mpsc;

use crate::bot::{
    chat_event::chat_event::{ChatEvent, ChatUser, EventType, MemberContext, Reply, RichContent, SentMessage},
    commands::commands::BotResult,
    permissions::permissions::{Capabilities, CapabilityResolver},
    platforms::discord::event_loop::DiscordHandler,
    state::def::{BotError, BotSecrets},
};

/// Messages kept per channel so deletions can still name their author.
const CACHED_MESSAGES: usize = 200;

pub fn map_message(msg: &Message, kind: EventType, reply: Arc<dyn Reply>) -> ChatEvent {
    let member = msg.member.as_ref().map(|m| MemberContext {
        nick: m.nick.clone(),
        roles: m.roles.iter().map(|r| r.to_string()).collect(),
    });

    let mut event = ChatEvent::new(kind, msg.channel_id.to_string(), msg.content.clone(), reply)
        .with_message_id(msg.id.to_string())
        .with_user(ChatUser {
            id: msg.author.id.to_string(),
            name: msg.author.name.clone(),
            bot: msg.author.bot,
            member,
        });

    if let Some(guild_id) = msg.guild_id {
        event = event.with_guild(guild_id.to_string());
    }
    event
}

pub struct DiscordReply {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordReply {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

fn sent(msg: &Message) -> SentMessage {
    SentMessage {
        id: msg.id.to_string(),
        channel_id: msg.channel_id.to_string(),
    }
}

fn to_embed(content: RichContent) -> CreateEmbed {
    let mut embed = CreateEmbed::new();
    if let Some(title) = content.title {
        embed = embed.title(title);
    }
    if let Some(description) = content.description {
        embed = embed.description(description);
    }
    for (name, value, inline) in content.fields {
        embed = embed.field(name, value, inline);
    }
    if let Some(color) = content.color {
        embed = embed.color(color);
    }
    if let Some(footer) = content.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    embed
}

#[async_trait]
impl Reply for DiscordReply {
    async fn reply(&self, text: &str) -> BotResult<SentMessage> {
        let msg = self.channel_id.say(&self.http, text).await?;
        Ok(sent(&msg))
    }

    async fn reply_structured(&self, content: RichContent) -> BotResult<SentMessage> {
        let builder = CreateMessage::new().embed(to_embed(content));
        let msg = self.channel_id.send_message(&self.http, builder).await?;
        Ok(sent(&msg))
    }
}

/// Computes channel permissions from the gateway cache.
pub struct DiscordResolver {
    cache: Arc<Cache>,
    http: Arc<Http>,
}

impl DiscordResolver {
    pub fn new(cache: Arc<Cache>, http: Arc<Http>) -> Self {
        Self { cache, http }
    }

    async fn permissions(&self, user_id: UserId, channel_id: &str) -> BotResult<Capabilities> {
        let channel = ChannelId::new(parse_id("channel", channel_id)?);
        let Some(guild_channel) = channel.to_channel(&self.http).await?.guild() else {
            return Ok(Capabilities::NONE);
        };
        let perms = guild_channel.permissions_for_user(&self.cache, user_id)?;
        Ok(Capabilities::from_bits(perms.bits()))
    }
}

fn parse_id(kind: &str, raw: &str) -> BotResult<u64> {
    match raw.parse::<u64>() {
        Ok(id) if id != 0 => Ok(id),
        _ => Err(BotError::Custom(format!("Invalid {kind} id `{raw}`"))),
    }
}

#[async_trait]
impl CapabilityResolver for DiscordResolver {
    async fn resolve(&self, user_id: &str, channel_id: &str) -> BotResult<Capabilities> {
        let user = UserId::new(parse_id("user", user_id)?);
        self.permissions(user, channel_id).await
    }

    async fn resolve_self(&self, channel_id: &str) -> BotResult<Capabilities> {
        let me = self.cache.current_user().id;
        self.permissions(me, channel_id).await
    }
}

pub async fn build_discord_client(secrets: &BotSecrets, tx: mpsc::Sender<ChatEvent>) -> BotResult<Client> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut cache_settings = serenity::cache::Settings::default();
    cache_settings.max_messages = CACHED_MESSAGES;

    let client = Client::builder(&secrets.discord_token, intents)
        .cache_settings(cache_settings)
        .event_handler(DiscordHandler::new(tx))
        .await?;
    Ok(client)
}
