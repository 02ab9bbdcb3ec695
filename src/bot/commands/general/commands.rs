use std::time::Duration;

use crate::{bot::{chat_event::chat_event::RichContent, commands::commands::{Command, CooldownScope}, replies::Replies}, cmd};

pub fn ping_command() -> Command {
    cmd!(
        Command::new("ping", |event, _state| {
            Box::pin(async move {
                event.reply(&Replies::pong()).await?;
                Ok(())
            })
        })
        .description("Check that the bot is alive")
        .usage("!ping")
        .allow_dm(true)
        .cooldown(Duration::from_secs(2), CooldownScope::Actor),
        "!ping"
    )
}

pub fn stats_command() -> Command {
    cmd!(
        Command::new("stats", |event, state| {
            Box::pin(async move {
                let content = RichContent::new()
                    .title("📋 Dispatcher stats")
                    .field("Active cooldowns", state.cooldowns.len().to_string(), true)
                    .field("Open sessions", state.callbacks.len().to_string(), true)
                    .field("Owners", state.config.owners.len().to_string(), true)
                    .color(0x00FFFF);
                event.reply_structured(content).await?;
                Ok(())
            })
        })
        .description("Show in-memory gate sizes")
        .usage("!stats")
        .cooldown(Duration::from_secs(10), CooldownScope::Channel),
        "!stats"
    )
}
