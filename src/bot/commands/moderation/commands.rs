use regex::Regex;

use crate::{bot::{chat_event::chat_event::EventType, commands::commands::{Command, Passive}, permissions::permissions::ActorClass, replies::Replies}, cmd};

const RESET_COOLDOWN_USAGE: &str = "!reset_cooldown <user:command>";

pub fn reset_cooldown_command() -> Command {
    cmd!(
        Command::new("reset_cooldown", |event, state| {
            Box::pin(async move {
                let args = event.args();
                let Some(key) = args.get(1) else {
                    event.reply(&Replies::usage(RESET_COOLDOWN_USAGE)).await?;
                    return Ok(());
                };

                state.cooldowns.remove(key);
                event.reply(&Replies::cooldown_reset(key)).await?;
                Ok(())
            })
        })
        .description("Clear an active cooldown")
        .usage(RESET_COOLDOWN_USAGE)
        .actor_class(ActorClass::Owner)
        .allow_dm(true),
        "!reset_cooldown"
    )
}

/// Warns the author of any created or edited message carrying an invite link.
pub fn link_watch_passive(invite: Regex) -> Passive {
    Passive::new("link_watch", move |event, _state| {
        let invite = invite.clone();
        Box::pin(async move {
            if !invite.is_match(&event.message) {
                return Ok(());
            }
            let Some(user) = &event.user else { return Ok(()); };
            event.reply(&Replies::link_warning(user.display_name())).await?;
            Ok(())
        })
    })
    .allowed_types(EventType::CREATED | EventType::UPDATED)
}
