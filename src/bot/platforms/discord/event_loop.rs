use std::sync::Arc;

use serenity::all::{ChannelId, Context, EventHandler, GuildId, Message, MessageId, MessageUpdateEvent, Ready};
use serenity::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bot::{
    chat_event::chat_event::{ChatEvent, EventType},
    platforms::discord::discord::{map_message, DiscordReply},
};

/// Gateway callbacks feed the bounded dispatch queue. A full queue
/// back-pressures the shard instead of dropping events.
pub struct DiscordHandler {
    tx: mpsc::Sender<ChatEvent>,
}

impl DiscordHandler {
    pub fn new(tx: mpsc::Sender<ChatEvent>) -> Self {
        Self { tx }
    }

    async fn forward(&self, event: ChatEvent) {
        if self.tx.send(event).await.is_err() {
            warn!("Dispatch queue closed, dropping gateway event");
        }
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected to {} guilds", ready.user.name, ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let reply = Arc::new(DiscordReply::new(ctx.http.clone(), msg.channel_id));
        self.forward(map_message(&msg, EventType::CREATED, reply)).await;
    }

    async fn message_update(&self, ctx: Context, _old: Option<Message>, new: Option<Message>, event: MessageUpdateEvent) {
        let Some(msg) = new else {
            debug!("Edit of uncached message {} in {}", event.id, event.channel_id);
            return;
        };
        let reply = Arc::new(DiscordReply::new(ctx.http.clone(), msg.channel_id));
        self.forward(map_message(&msg, EventType::UPDATED, reply)).await;
    }

    async fn message_delete(&self, ctx: Context, channel_id: ChannelId, deleted_message_id: MessageId, guild_id: Option<GuildId>) {
        let reply = Arc::new(DiscordReply::new(ctx.http.clone(), channel_id));
        let cached = ctx.cache.message(channel_id, deleted_message_id).map(|m| Message::clone(&m));

        // Without a cached copy the author is unknown and the dispatcher drops it.
        let event = match cached {
            Some(msg) => map_message(&msg, EventType::DELETED, reply),
            None => {
                let mut event = ChatEvent::new(EventType::DELETED, channel_id.to_string(), "", reply)
                    .with_message_id(deleted_message_id.to_string());
                if let Some(guild_id) = guild_id {
                    event = event.with_guild(guild_id.to_string());
                }
                event
            }
        };
        self.forward(event).await;
    }
}
