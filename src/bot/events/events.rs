use std::{any::Any, panic::{catch_unwind, AssertUnwindSafe}, sync::{Arc, PoisonError, RwLock}, time::Duration};

use tracing::{debug, error, info, warn};

use crate::bot::chat_event::chat_event::ChatEvent;

#[derive(Debug, Clone)]
pub struct CommandRan {
    pub event: Arc<ChatEvent>,
    pub module: String,
    pub command: String,
    pub elapsed: Duration,
    /// Set when the handler returned `Err`.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandPanicked {
    pub event: Arc<ChatEvent>,
    pub module: String,
    pub command: String,
    pub panic: String,
}

#[derive(Debug, Clone)]
pub struct PassiveRan {
    pub event: Arc<ChatEvent>,
    pub module: String,
    pub passive: String,
    pub elapsed: Duration,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PassivePanicked {
    pub event: Arc<ChatEvent>,
    pub module: String,
    pub passive: String,
    pub panic: String,
}

#[derive(Debug, Clone)]
pub struct EventProcessed {
    pub event: Arc<ChatEvent>,
    /// False when the event was dropped before routing (bot or missing actor).
    pub dispatched: bool,
    pub commands_started: usize,
    pub passives_started: usize,
}

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    CommandRan(CommandRan),
    CommandPanicked(CommandPanicked),
    PassiveRan(PassiveRan),
    PassivePanicked(PassivePanicked),
    EventProcessed(EventProcessed),
}

/// Ties a payload type to its `LifecycleEvent` variant for typed subscriptions.
pub trait Lifecycle: Sized + 'static {
    fn extract(event: &LifecycleEvent) -> Option<&Self>;
}

macro_rules! lifecycle {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl Lifecycle for $variant {
                fn extract(event: &LifecycleEvent) -> Option<&Self> {
                    match event {
                        LifecycleEvent::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$variant> for LifecycleEvent {
                fn from(inner: $variant) -> Self {
                    LifecycleEvent::$variant(inner)
                }
            }
        )+
    };
}

lifecycle!(CommandRan, CommandPanicked, PassiveRan, PassivePanicked, EventProcessed);

type Subscriber = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Publish/subscribe point for handler outcomes.
#[derive(Default)]
pub struct Emitter {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler<E, F>(&self, handler: F)
    where
        E: Lifecycle,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let Some(inner) = E::extract(event) {
                handler(inner);
            }
        });
    }

    /// Receives every lifecycle event.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Invokes subscribers in order. A panicking subscriber is logged and skipped.
    pub fn emit(&self, event: impl Into<LifecycleEvent>) {
        let event = event.into();
        let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
        for subscriber in subscribers.iter() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| subscriber(&event))) {
                error!("Lifecycle subscriber panicked: {}", panic_message(payload.as_ref()));
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Renders a panic payload the way the default hook does.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub fn subscribe_logging(emitter: &Emitter) {
    emitter.subscribe(|event| match event {
        LifecycleEvent::CommandRan(ran) => match &ran.error {
            None => info!(
                "Command {}/{} ran for {} in {:?}",
                ran.module,
                ran.command,
                ran.event.user_id().unwrap_or("?"),
                ran.elapsed
            ),
            Some(e) => warn!("Command {}/{} failed: {e}", ran.module, ran.command),
        },
        LifecycleEvent::CommandPanicked(p) => {
            error!("Command {}/{} panicked: {}", p.module, p.command, p.panic)
        }
        LifecycleEvent::PassiveRan(ran) => match &ran.error {
            None => debug!("Passive {}/{} ran in {:?}", ran.module, ran.passive, ran.elapsed),
            Some(e) => warn!("Passive {}/{} failed: {e}", ran.module, ran.passive),
        },
        LifecycleEvent::PassivePanicked(p) => {
            error!("Passive {}/{} panicked: {}", p.module, p.passive, p.panic)
        }
        LifecycleEvent::EventProcessed(p) => debug!(
            "Processed {} event {} in {} ({} commands, {} passives)",
            p.event.kind, p.event.message_id, p.event.channel_id, p.commands_started, p.passives_started
        ),
    });
}
