use std::sync::Arc;

use tokio::sync::mpsc::Receiver;
use tracing::info;

use crate::bot::{chat_event::chat_event::ChatEvent, dispatcher::dispatcher::Dispatcher};

pub mod state;
pub mod chat_event;
pub mod dispatcher;
pub mod commands;
pub mod platforms;
pub mod permissions;
pub mod db;
pub mod runtime;
pub mod cooldown;
pub mod callback;
pub mod events;
pub mod replies;

/// Drains the gateway queue until every sender is gone, then waits for in-flight handlers.
pub async fn run_event_loop(dispatcher: Arc<Dispatcher>, mut rx: Receiver<ChatEvent>) {
    while let Some(event) = rx.recv().await {
        dispatcher.ingest(event).await;
    }

    info!("Event queue closed, waiting for {} handlers", dispatcher.pool().in_flight());
    dispatcher.pool().wait_idle().await;
}
