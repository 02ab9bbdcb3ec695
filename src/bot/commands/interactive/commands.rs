use std::time::Duration;

use crate::{bot::{callback::callback::CallbackError, chat_event::chat_event::session_key, commands::commands::{Command, CooldownScope}, replies::Replies}, cmd};

/// Waits for the caller's next message in the channel and repeats it.
pub fn echo_command() -> Command {
    cmd!(
        Command::new("echo", |event, state| {
            Box::pin(async move {
                let Some(user) = &event.user else { return Ok(()); };
                let name = user.display_name();

                let mut session = match state.callbacks.make(session_key(&event.channel_id, &user.id)) {
                    Ok(session) => session,
                    Err(CallbackError::AlreadyExists(_)) => {
                        event.reply(&Replies::echo_busy(name)).await?;
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };

                event.reply(&Replies::echo_prompt(name)).await?;

                let next = session.recv_timeout(state.config.session_timeout).await;
                state.callbacks.delete(session.key());

                match next {
                    Some(next) => event.reply(&next.message).await?,
                    None => event.reply(&Replies::echo_timeout(name)).await?,
                };

                Ok(())
            })
        })
        .description("Repeat your next message")
        .usage("!echo")
        .cooldown(Duration::from_secs(5), CooldownScope::Channel),
        "!echo"
    )
}
