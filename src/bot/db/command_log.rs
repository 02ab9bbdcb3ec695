use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::warn;

use crate::bot::{commands::commands::BotResult, events::events::{CommandRan, Emitter}, runtime::task_pool::TaskPool};

pub const COMMAND_LOG_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS command_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        command TEXT NOT NULL,
        args TEXT NOT NULL,
        user_id TEXT NOT NULL,
        guild_id TEXT,
        channel_id TEXT NOT NULL,
        message_id TEXT NOT NULL,
        error TEXT,
        created_at TEXT NOT NULL
    );
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLogEntry {
    pub command: String,
    pub args: Vec<String>,
    pub user_id: String,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub message_id: String,
    /// Set when the handler returned `Err`.
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CommandLogEntry {
    pub fn from_ran(ran: &CommandRan) -> Option<Self> {
        let event = &ran.event;
        Some(Self {
            command: ran.command.clone(),
            args: event.args().into_iter().skip(1).map(str::to_string).collect(),
            user_id: event.user_id()?.to_string(),
            guild_id: event.guild_id.clone(),
            channel_id: event.channel_id.clone(),
            message_id: event.message_id.clone(),
            error: ran.error.clone(),
            timestamp: event.received_at,
        })
    }
}

#[async_trait]
pub trait CommandLogSink: Send + Sync {
    async fn persist(&self, entry: &CommandLogEntry) -> BotResult<()>;
}

pub struct SqliteCommandLog {
    pool: SqlitePool,
}

impl SqliteCommandLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn command_usage(&self, command: &str) -> BotResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM command_log WHERE command = ?")
            .bind(command)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl CommandLogSink for SqliteCommandLog {
    async fn persist(&self, entry: &CommandLogEntry) -> BotResult<()> {
        sqlx::query(
            r#"
            INSERT INTO command_log (command, args, user_id, guild_id, channel_id, message_id, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.command.as_str())
        .bind(serde_json::to_string(&entry.args)?)
        .bind(entry.user_id.as_str())
        .bind(entry.guild_id.as_deref())
        .bind(entry.channel_id.as_str())
        .bind(entry.message_id.as_str())
        .bind(entry.error.as_deref())
        .bind(entry.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Persists every `CommandRan` on `tasks`, so draining the pool also flushes the log.
/// Insert failures are only logged.
pub fn subscribe_command_log(emitter: &Emitter, sink: Arc<dyn CommandLogSink>, tasks: TaskPool) {
    emitter.add_handler(move |ran: &CommandRan| {
        let Some(entry) = CommandLogEntry::from_ran(ran) else {
            return;
        };
        let sink = sink.clone();
        tasks.spawn_unbounded(async move {
            if let Err(e) = sink.persist(&entry).await {
                warn!("Failed to persist command log for {}: {e}", entry.command);
            }
        });
    });
}
