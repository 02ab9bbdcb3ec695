use std::{collections::HashSet, io, sync::Arc, time::Duration};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bot::{callback::callback::{CallbackError, CallbackManager}, cooldown::cooldown::CooldownGate, events::events::Emitter, permissions::permissions::CapabilityResolver, runtime::task_pool::TaskPool};

/// Shared state handed to every handler invocation.
pub struct AppState {
    pub config: Arc<BotConfig>,
    pub cooldowns: CooldownGate,
    pub callbacks: CallbackManager,
    pub emitter: Arc<Emitter>,
    pub resolver: Arc<dyn CapabilityResolver>,
    /// Handler and background work, bounded by `max_handlers`.
    pub tasks: TaskPool,
}

pub struct BotSecrets {
    pub discord_token: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct BotConfig {
    #[serde(default)]
    pub owners: HashSet<String>,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_handlers")]
    pub max_handlers: usize,
    #[serde(default = "default_session_timeout", with = "secs")]
    pub session_timeout: Duration,
}

pub(crate) fn default_database_url() -> String {
    "sqlite://modbot.db?mode=rwc".into()
}

pub(crate) fn default_queue_capacity() -> usize {
    256
}

pub(crate) fn default_max_handlers() -> usize {
    64
}

pub(crate) fn default_session_timeout() -> Duration {
    Duration::from_secs(30)
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
    #[error("Callback error: {0}")]
    Callback(#[from] CallbackError),
    #[error("Missing configuration value: {0}")]
    ConfigMissing(&'static str),
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidConfig { key: &'static str, value: String },
    #[error("Module `{0}` is already registered")]
    DuplicateModule(String),
    #[error("Module `{module}` already has a command named `{command}`")]
    DuplicateCommand { module: String, command: String },
    #[error("Trigger `{trigger}` in module `{module}` is claimed by both `{existing}` and `{command}`")]
    DuplicateTrigger { module: String, trigger: String, existing: String, command: String },
    #[error("{0}")]
    Custom(String),
}
