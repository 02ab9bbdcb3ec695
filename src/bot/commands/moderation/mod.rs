use regex::Regex;

use crate::bot::commands::commands::{BotResult, Command, Module, Passive};

pub mod commands;

pub const INVITE_PATTERN: &str = r"(?i)(discord\.gg|discord(app)?\.com/invite)/[a-z0-9-]+";

pub struct ModerationModule {
    invite: Regex,
}

impl ModerationModule {
    pub fn new() -> BotResult<Self> {
        Ok(Self { invite: Regex::new(INVITE_PATTERN)? })
    }
}

impl Module for ModerationModule {
    fn name(&self) -> &str {
        "moderation"
    }

    fn commands(&self) -> Vec<Command> {
        vec![commands::reset_cooldown_command()]
    }

    fn passives(&self) -> Vec<Passive> {
        vec![commands::link_watch_passive(self.invite.clone())]
    }

    fn allow_dm(&self) -> bool {
        true
    }
}
