use std::{collections::{HashMap, HashSet}, sync::Arc};

use tracing::{debug, info};

use crate::bot::{chat_event::chat_event::EventType, commands::commands::{BotResult, Command, Module, Passive}, state::def::{AppState, BotError}};

pub mod commands;
pub mod general;
pub mod interactive;
pub mod moderation;

/// A module after registration: commands in an ordered list with name and trigger indexes.
pub struct RegisteredModule {
    pub name: String,
    pub allowed_types: EventType,
    pub allow_dm: bool,
    commands: Vec<Arc<Command>>,
    by_name: HashMap<String, usize>,
    by_trigger: HashMap<String, usize>,
    passives: Vec<Arc<Passive>>,
}

impl RegisteredModule {
    fn build(module: &dyn Module) -> BotResult<Self> {
        let name = module.name().to_string();
        let mut commands = Vec::new();
        let mut by_name = HashMap::new();
        let mut by_trigger: HashMap<String, usize> = HashMap::new();

        for cmd in module.commands() {
            if by_name.contains_key(&cmd.name) {
                return Err(BotError::DuplicateCommand { module: name, command: cmd.name });
            }
            let idx = commands.len();

            for trigger in &cmd.triggers {
                match by_trigger.get(trigger) {
                    Some(&existing) if existing != idx => {
                        let existing: &Arc<Command> = &commands[existing];
                        return Err(BotError::DuplicateTrigger {
                            module: name,
                            trigger: trigger.clone(),
                            existing: existing.name.clone(),
                            command: cmd.name.clone(),
                        });
                    }
                    _ => {
                        by_trigger.insert(trigger.clone(), idx);
                    }
                }
            }

            by_name.insert(cmd.name.clone(), idx);
            commands.push(Arc::new(cmd));
        }

        Ok(Self {
            name,
            allowed_types: module.allowed_types(),
            allow_dm: module.allow_dm(),
            commands,
            by_name,
            by_trigger,
            passives: module.passives().into_iter().map(Arc::new).collect(),
        })
    }

    pub fn command(&self, name: &str) -> Option<&Arc<Command>> {
        self.by_name.get(name).map(|&idx| &self.commands[idx])
    }

    /// The command claiming `token` as a trigger (exact, case-sensitive).
    pub fn find_trigger(&self, token: &str) -> Option<&Arc<Command>> {
        self.by_trigger.get(token).map(|&idx| &self.commands[idx])
    }

    pub fn commands(&self) -> &[Arc<Command>] {
        &self.commands
    }

    pub fn passives(&self) -> &[Arc<Passive>] {
        &self.passives
    }
}

/// Startup-time builder. Mutated single-threaded, then frozen.
pub struct ModuleRegistry {
    state: Arc<AppState>,
    names: HashSet<String>,
    modules: Vec<RegisteredModule>,
}

impl ModuleRegistry {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state, names: HashSet::new(), modules: Vec::new() }
    }

    pub fn register(&mut self, module: Arc<dyn Module>) -> BotResult<()> {
        let name = module.name().to_string();
        if self.names.contains(&name) {
            return Err(BotError::DuplicateModule(name));
        }

        let registered = RegisteredModule::build(module.as_ref())?;
        module.on_register(&self.state)?;

        info!(
            "Registered module {} ({} commands, {} passives)",
            name,
            registered.commands.len(),
            registered.passives.len()
        );
        for command in registered.commands() {
            debug!("  {} [{}] {}", command.name, command.usage, command.description);
        }
        self.names.insert(name);
        self.modules.push(registered);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn freeze(self) -> Arc<Modules> {
        Arc::new(Modules { modules: self.modules })
    }
}

/// Immutable snapshot read by the dispatcher without locking.
pub struct Modules {
    modules: Vec<RegisteredModule>,
}

impl Modules {
    /// Modules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredModule> {
        self.modules.iter()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
