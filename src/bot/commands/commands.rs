use std::{sync::Arc, time::Duration};
use futures::future::BoxFuture;

use crate::bot::{chat_event::chat_event::{ChatEvent, EventType}, permissions::permissions::{ActorClass, Capabilities}, state::def::{AppState, BotError}};

pub type BotResult<T> = Result<T, BotError>;

pub type Handler = Arc<dyn Fn(Arc<ChatEvent>, Arc<AppState>) -> BoxFuture<'static, BotResult<()>> + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CooldownScope {
    #[default]
    Actor,
    Channel,
}

/// A trigger-activated handler gated by type mask, DM policy, authorization and cooldown.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub usage: String,
    pub triggers: Vec<String>,
    pub allowed_types: EventType,
    pub allow_dm: bool,
    pub cooldown: Duration,
    pub cooldown_scope: CooldownScope,
    pub required_perms: Capabilities,
    pub check_bot_perms: bool,
    pub actor_class: ActorClass,
    pub enabled: bool,
    handler: Handler,
}

impl Command {
    /// A `CREATED`-only, guild-only command with no triggers, cooldown or requirements.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Arc<ChatEvent>, Arc<AppState>) -> BoxFuture<'static, BotResult<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            usage: String::new(),
            triggers: Vec::new(),
            allowed_types: EventType::CREATED,
            allow_dm: false,
            cooldown: Duration::ZERO,
            cooldown_scope: CooldownScope::Actor,
            required_perms: Capabilities::NONE,
            check_bot_perms: false,
            actor_class: ActorClass::Anyone,
            enabled: true,
            handler: Arc::new(func),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers.extend(triggers.into_iter().map(Into::into));
        self
    }

    pub fn allowed_types(mut self, mask: EventType) -> Self {
        self.allowed_types = mask;
        self
    }

    pub fn allow_dm(mut self, allow: bool) -> Self {
        self.allow_dm = allow;
        self
    }

    pub fn cooldown(mut self, duration: Duration, scope: CooldownScope) -> Self {
        self.cooldown = duration;
        self.cooldown_scope = scope;
        self
    }

    pub fn required_perms(mut self, perms: Capabilities) -> Self {
        self.required_perms = perms;
        self
    }

    pub fn check_bot_perms(mut self, check: bool) -> Self {
        self.check_bot_perms = check;
        self
    }

    pub fn actor_class(mut self, class: ActorClass) -> Self {
        self.actor_class = class;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn execute(&self, event: Arc<ChatEvent>, state: Arc<AppState>) -> BoxFuture<'static, BotResult<()>> {
        (self.handler)(event, state)
    }
}

/// Runs on every event whose type matches; no trigger.
#[derive(Clone)]
pub struct Passive {
    pub name: String,
    pub allowed_types: EventType,
    pub enabled: bool,
    handler: Handler,
}

impl Passive {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Arc<ChatEvent>, Arc<AppState>) -> BoxFuture<'static, BotResult<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            allowed_types: EventType::CREATED,
            enabled: true,
            handler: Arc::new(func),
        }
    }

    pub fn allowed_types(mut self, mask: EventType) -> Self {
        self.allowed_types = mask;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn execute(&self, event: Arc<ChatEvent>, state: Arc<AppState>) -> BoxFuture<'static, BotResult<()>> {
        (self.handler)(event, state)
    }
}

/// A feature area contributing commands and passives.
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    fn commands(&self) -> Vec<Command> {
        Vec::new()
    }

    /// Evaluated in the order returned.
    fn passives(&self) -> Vec<Passive> {
        Vec::new()
    }

    fn allowed_types(&self) -> EventType {
        EventType::ALL
    }

    fn allow_dm(&self) -> bool {
        false
    }

    /// Runs once when the module is registered; an error aborts registration.
    fn on_register(&self, _state: &AppState) -> BotResult<()> {
        Ok(())
    }
}

/// Plain data module for groups that need no hook.
pub struct CommandGroup {
    pub name: String,
    pub commands: Vec<Command>,
    pub passives: Vec<Passive>,
    pub allowed_types: EventType,
    pub allow_dm: bool,
}

impl CommandGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            passives: Vec::new(),
            allowed_types: EventType::ALL,
            allow_dm: false,
        }
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn passive(mut self, passive: Passive) -> Self {
        self.passives.push(passive);
        self
    }

    pub fn allowed_types(mut self, mask: EventType) -> Self {
        self.allowed_types = mask;
        self
    }

    pub fn allow_dm(mut self, allow: bool) -> Self {
        self.allow_dm = allow;
        self
    }
}

impl Module for CommandGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn commands(&self) -> Vec<Command> {
        self.commands.clone()
    }

    fn passives(&self) -> Vec<Passive> {
        self.passives.clone()
    }

    fn allowed_types(&self) -> EventType {
        self.allowed_types
    }

    fn allow_dm(&self) -> bool {
        self.allow_dm
    }
}

#[macro_export]
macro_rules! cmd {
    ($command:expr, $($trigger:expr),+ $(,)?) => {
        $command.triggers([$($trigger),+])
    };
}
