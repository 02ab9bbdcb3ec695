use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use crate::bot::{commands::commands::BotResult, db::command_log::COMMAND_LOG_TABLE};

pub mod command_log;

pub async fn connect(database_url: &str) -> BotResult<SqlitePool> {
    let pool = SqlitePoolOptions::new().max_connections(5).connect(database_url).await?;
    info!("Connected to {database_url}");
    Ok(pool)
}

pub async fn initialize_database(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(COMMAND_LOG_TABLE).execute(pool).await?;
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_command_log_command
        ON command_log (command);
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
