use core::fmt;
use std::{collections::HashSet, fmt::Display, ops::BitOr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bot::{chat_event::chat_event::ChatUser, commands::commands::{BotResult, Command}};

/// Opaque capability bitmask resolved per actor and channel.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug, Deserialize, Serialize)]
pub struct Capabilities(u64);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    /// Implies every other bit. Matches Discord's `ADMINISTRATOR`.
    pub const ADMINISTRATOR: Capabilities = Capabilities(1 << 3);

    pub const fn from_bits(bits: u64) -> Self {
        Capabilities(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_admin(self) -> bool {
        self.0 & Self::ADMINISTRATOR.0 != 0
    }

    /// Holder satisfies `required`: any shared bit, or administrator.
    pub const fn satisfies(self, required: Capabilities) -> bool {
        required.is_empty() || self.is_admin() || self.0 & required.0 != 0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

#[derive(Clone, Copy, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub enum ActorClass {
    Owner,
    Elevated,
    #[default]
    Anyone,
}

impl Display for ActorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActorClass::Owner => "owner",
            ActorClass::Elevated => "elevated",
            ActorClass::Anyone => "anyone",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Authorization {
    Allowed,
    OwnerOnly,
    NotElevated,
    MissingCapabilities,
    BotMissingCapabilities,
}

impl Authorization {
    pub fn is_allowed(self) -> bool {
        self == Authorization::Allowed
    }
}

/// Resolves an actor's capability bits in a channel.
#[async_trait]
pub trait CapabilityResolver: Send + Sync {
    async fn resolve(&self, user_id: &str, channel_id: &str) -> BotResult<Capabilities>;

    /// The bot's own bits, used when a command sets `check_bot_perms`.
    async fn resolve_self(&self, channel_id: &str) -> BotResult<Capabilities>;
}

/// Pure authorization check. `bot_caps` is only consulted when the command asks for it.
pub fn authorize(command: &Command, actor: &ChatUser, owners: &HashSet<String>, actor_caps: Capabilities, bot_caps: Option<Capabilities>) -> Authorization {
    let is_owner = owners.contains(&actor.id);

    match command.actor_class {
        ActorClass::Anyone => {}
        ActorClass::Owner if !is_owner => return Authorization::OwnerOnly,
        ActorClass::Elevated if !is_owner && !actor_caps.is_admin() => return Authorization::NotElevated,
        _ => {}
    }

    if !actor_caps.satisfies(command.required_perms) {
        return Authorization::MissingCapabilities;
    }

    if command.check_bot_perms && !bot_caps.unwrap_or_default().satisfies(command.required_perms) {
        return Authorization::BotMissingCapabilities;
    }

    Authorization::Allowed
}
