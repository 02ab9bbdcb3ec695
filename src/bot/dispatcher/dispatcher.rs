use std::{sync::Arc, time::Instant};

use tracing::{debug, warn};

use crate::bot::{callback::callback::Delivery, chat_event::chat_event::{session_key, ChatEvent, ChatUser, EventType}, commands::{commands::{Command, CooldownScope, Passive}, Modules, RegisteredModule}, cooldown::cooldown::{actor_key, channel_key}, events::events::{CommandPanicked, CommandRan, EventProcessed, PassivePanicked, PassiveRan}, permissions::permissions::{authorize, ActorClass, Authorization, Capabilities}, replies::Replies, runtime::task_pool::{supervise, TaskOutcome, TaskPool}, state::def::AppState};

/// Routes inbound events to module passives and commands.
pub struct Dispatcher {
    state: Arc<AppState>,
    modules: Arc<Modules>,
}

impl Dispatcher {
    pub fn new(state: Arc<AppState>, modules: Arc<Modules>) -> Self {
        Self { state, modules }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn pool(&self) -> &TaskPool {
        &self.state.tasks
    }

    /// Handles one inbound event. Emits exactly one `EventProcessed`.
    /// Handlers are queued on the pool; this never waits for a free slot.
    pub async fn ingest(&self, event: ChatEvent) {
        let event = Arc::new(event);

        let Some(user) = event.user.clone().filter(|u| !u.bot) else {
            debug!("Dropping event {} without a human actor", event.message_id);
            self.state.emitter.emit(EventProcessed {
                event,
                dispatched: false,
                commands_started: 0,
                passives_started: 0,
            });
            return;
        };

        if event.kind == EventType::CREATED {
            let key = session_key(&event.channel_id, &user.id);
            match self.state.callbacks.deliver(&key, event.clone()) {
                Delivery::Delivered => debug!("Delivered event to session {key}"),
                Delivery::Dropped => warn!("Session {key} missed a message, mailbox full"),
                Delivery::NoSession => {}
            }
        }

        let mut commands_started = 0;
        let mut passives_started = 0;

        for module in self.modules.iter() {
            if event.is_dm() && !module.allow_dm {
                continue;
            }
            if !event.kind.intersects(module.allowed_types) {
                continue;
            }

            for passive in module.passives() {
                if !passive.enabled || !event.kind.intersects(passive.allowed_types) {
                    continue;
                }
                self.spawn_passive(module, passive.clone(), event.clone());
                passives_started += 1;
            }

            let Some(token) = event.args().first().map(|t| t.to_string()) else {
                continue;
            };
            let Some(command) = module.find_trigger(&token) else {
                continue;
            };

            if !self.admit(command, &event, &user).await {
                continue;
            }

            self.spawn_command(module, command.clone(), event.clone());
            commands_started += 1;

            if let Some(key) = cooldown_key(command, &event, &user) {
                self.state.cooldowns.set(key, command.cooldown);
            }
        }

        self.state.emitter.emit(EventProcessed {
            event,
            dispatched: true,
            commands_started,
            passives_started,
        });
    }

    /// Filters, authorization and cooldown for a matched command.
    async fn admit(&self, command: &Command, event: &Arc<ChatEvent>, user: &ChatUser) -> bool {
        if !command.enabled {
            return false;
        }
        if !event.kind.intersects(command.allowed_types) {
            return false;
        }
        if event.is_dm() && !command.allow_dm {
            return false;
        }

        let (actor_caps, bot_caps) = self.resolve_capabilities(command, event, user).await;
        match authorize(command, user, &self.state.config.owners, actor_caps, bot_caps) {
            Authorization::Allowed => {}
            Authorization::OwnerOnly => {
                self.notify(event, Replies::owner_only(user.display_name(), &command.name));
                return false;
            }
            denied => {
                debug!("{} denied {} for {}: {:?}", command.name, event.message_id, user.id, denied);
                return false;
            }
        }

        if let Some(key) = cooldown_key(command, event, user) {
            if let Some(remaining) = self.state.cooldowns.check(&key) {
                self.notify(event, Replies::on_cooldown(user.display_name(), remaining));
                return false;
            }
        }

        true
    }

    async fn resolve_capabilities(&self, command: &Command, event: &ChatEvent, user: &ChatUser) -> (Capabilities, Option<Capabilities>) {
        let wants_actor = !command.required_perms.is_empty() || command.actor_class == ActorClass::Elevated;
        // No guild context in DMs, so nothing can be granted there.
        if event.is_dm() || !wants_actor {
            return (Capabilities::NONE, None);
        }

        let actor_caps = match self.state.resolver.resolve(&user.id, &event.channel_id).await {
            Ok(caps) => caps,
            Err(e) => {
                warn!("Could not resolve capabilities of {} in {}: {e}", user.id, event.channel_id);
                Capabilities::NONE
            }
        };

        let bot_caps = if command.check_bot_perms && !command.required_perms.is_empty() {
            match self.state.resolver.resolve_self(&event.channel_id).await {
                Ok(caps) => Some(caps),
                Err(e) => {
                    warn!("Could not resolve own capabilities in {}: {e}", event.channel_id);
                    None
                }
            }
        } else {
            None
        };

        (actor_caps, bot_caps)
    }

    /// Notices skip the permit queue so a full pool cannot delay them.
    fn notify(&self, event: &Arc<ChatEvent>, text: String) {
        let event = event.clone();
        self.state.tasks.spawn_unbounded(async move {
            if let Err(e) = event.reply(&text).await {
                warn!("Failed to send notice in {}: {e}", event.channel_id);
            }
        });
    }

    fn spawn_passive(&self, module: &RegisteredModule, passive: Arc<Passive>, event: Arc<ChatEvent>) {
        let state = self.state.clone();
        let module = module.name.clone();

        self.state.tasks.spawn(async move {
            let started = Instant::now();
            let run = {
                let (passive, event, state) = (passive.clone(), event.clone(), state.clone());
                async move { passive.execute(event, state).await }
            };

            match supervise(run).await {
                TaskOutcome::Completed(result) => state.emitter.emit(PassiveRan {
                    event,
                    module,
                    passive: passive.name.clone(),
                    elapsed: started.elapsed(),
                    error: result.err().map(|e| e.to_string()),
                }),
                TaskOutcome::Panicked(panic) => state.emitter.emit(PassivePanicked {
                    event,
                    module,
                    passive: passive.name.clone(),
                    panic,
                }),
            }
        });
    }

    fn spawn_command(&self, module: &RegisteredModule, command: Arc<Command>, event: Arc<ChatEvent>) {
        let state = self.state.clone();
        let module = module.name.clone();

        self.state.tasks.spawn(async move {
            let started = Instant::now();
            let run = {
                let (command, event, state) = (command.clone(), event.clone(), state.clone());
                async move { command.execute(event, state).await }
            };

            match supervise(run).await {
                TaskOutcome::Completed(result) => state.emitter.emit(CommandRan {
                    event,
                    module,
                    command: command.name.clone(),
                    elapsed: started.elapsed(),
                    error: result.err().map(|e| e.to_string()),
                }),
                TaskOutcome::Panicked(panic) => state.emitter.emit(CommandPanicked {
                    event,
                    module,
                    command: command.name.clone(),
                    panic,
                }),
            }
        });
    }
}

fn cooldown_key(command: &Command, event: &ChatEvent, user: &ChatUser) -> Option<String> {
    if command.cooldown.is_zero() {
        return None;
    }
    Some(match command.cooldown_scope {
        CooldownScope::Actor => actor_key(&user.id, &command.name),
        CooldownScope::Channel => channel_key(&event.channel_id, &command.name),
    })
}
