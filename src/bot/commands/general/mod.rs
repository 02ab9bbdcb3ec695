use crate::bot::commands::commands::{Command, Module};

pub mod commands;

pub struct GeneralModule;

impl Module for GeneralModule {
    fn name(&self) -> &str {
        "general"
    }

    fn commands(&self) -> Vec<Command> {
        vec![commands::ping_command(), commands::stats_command()]
    }

    fn allow_dm(&self) -> bool {
        true
    }
}
