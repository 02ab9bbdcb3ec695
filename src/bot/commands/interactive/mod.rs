use crate::bot::{commands::commands::{BotResult, Command, Module}, state::def::{AppState, BotError}};

pub mod commands;

pub struct InteractiveModule;

impl Module for InteractiveModule {
    fn name(&self) -> &str {
        "interactive"
    }

    fn commands(&self) -> Vec<Command> {
        vec![commands::echo_command()]
    }

    fn on_register(&self, state: &AppState) -> BotResult<()> {
        if state.config.session_timeout.is_zero() {
            return Err(BotError::InvalidConfig { key: "session_timeout", value: "0".into() });
        }
        Ok(())
    }
}
