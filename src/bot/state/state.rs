use std::{collections::HashSet, env::var, fs, str::FromStr, sync::Arc, time::Duration};

use tracing::info;

use crate::bot::{callback::callback::CallbackManager, commands::commands::BotResult, cooldown::cooldown::CooldownGate, events::events::Emitter, permissions::permissions::CapabilityResolver, runtime::task_pool::TaskPool, state::def::{default_database_url, default_max_handlers, default_queue_capacity, default_session_timeout, AppState, BotConfig, BotError, BotSecrets}};

impl AppState {
    pub fn new(config: BotConfig, resolver: Arc<dyn CapabilityResolver>) -> Self {
        let tasks = TaskPool::new(config.max_handlers);
        Self {
            config: Arc::new(config),
            cooldowns: CooldownGate::new(),
            callbacks: CallbackManager::new(),
            emitter: Arc::new(Emitter::new()),
            resolver,
            tasks,
        }
    }
}

impl BotSecrets {
    pub fn from_env() -> BotResult<Self> {
        dotenvy::dotenv().ok();
        let discord_token = var("DISCORD_TOKEN").map_err(|_| BotError::ConfigMissing("DISCORD_TOKEN"))?;

        Ok(Self { discord_token })
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            owners: HashSet::new(),
            database_url: default_database_url(),
            queue_capacity: default_queue_capacity(),
            max_handlers: default_max_handlers(),
            session_timeout: default_session_timeout(),
        }
    }
}

impl BotConfig {
    /// Loads `BOT_CONFIG_FILE` (JSON) if set, then applies environment overrides.
    pub fn load() -> BotResult<Self> {
        dotenvy::dotenv().ok();

        let mut config = match var("BOT_CONFIG_FILE") {
            Ok(path) => {
                info!("Loading bot config from {path}");
                serde_json::from_str(&fs::read_to_string(path)?)?
            }
            Err(_) => BotConfig::default(),
        };

        if let Ok(owners) = var("OWNER_IDS") {
            config.owners = parse_owners(&owners);
        }
        if let Ok(url) = var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(value) = var("DISPATCH_QUEUE_SIZE") {
            config.queue_capacity = parse_number("DISPATCH_QUEUE_SIZE", &value)?;
        }
        if let Ok(value) = var("MAX_CONCURRENT_HANDLERS") {
            config.max_handlers = parse_number("MAX_CONCURRENT_HANDLERS", &value)?;
        }
        if let Ok(value) = var("SESSION_TIMEOUT_SECS") {
            config.session_timeout = Duration::from_secs(parse_number("SESSION_TIMEOUT_SECS", &value)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BotResult<()> {
        if self.queue_capacity == 0 {
            return Err(BotError::InvalidConfig { key: "queue_capacity", value: "0".into() });
        }
        if self.max_handlers == 0 {
            return Err(BotError::InvalidConfig { key: "max_handlers", value: "0".into() });
        }
        Ok(())
    }
}

pub fn parse_owners(input: &str) -> HashSet<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> BotResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BotError::InvalidConfig { key, value: value.to_string() })
}
