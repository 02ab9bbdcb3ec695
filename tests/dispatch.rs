use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use modbot::{
    bot::{
        callback::callback::CallbackError,
        chat_event::chat_event::{session_key, ChatEvent, ChatUser, EventType, Reply, RichContent, SentMessage},
        commands::{
            commands::{BotResult, Command, CommandGroup, Module, Passive},
            general::GeneralModule,
            interactive::InteractiveModule,
            moderation::ModerationModule,
            ModuleRegistry,
        },
        cooldown::cooldown::actor_key,
        dispatcher::dispatcher::Dispatcher,
        events::events::LifecycleEvent,
        permissions::permissions::{ActorClass, Capabilities, CapabilityResolver},
        replies::Replies,
        state::def::{AppState, BotConfig},
    },
    cmd,
};

#[derive(Default)]
struct RecordingReply {
    sent: Mutex<Vec<String>>,
}

impl RecordingReply {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reply for RecordingReply {
    async fn reply(&self, text: &str) -> BotResult<SentMessage> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(text.to_string());
        Ok(SentMessage { id: sent.len().to_string(), channel_id: "chan1".into() })
    }

    async fn reply_structured(&self, content: RichContent) -> BotResult<SentMessage> {
        self.reply(content.title.as_deref().unwrap_or("embed")).await
    }
}

struct StaticResolver(Capabilities);

#[async_trait]
impl CapabilityResolver for StaticResolver {
    async fn resolve(&self, _user_id: &str, _channel_id: &str) -> BotResult<Capabilities> {
        Ok(self.0)
    }

    async fn resolve_self(&self, _channel_id: &str) -> BotResult<Capabilities> {
        Ok(self.0)
    }
}

struct Harness {
    dispatcher: Dispatcher,
    replies: Arc<RecordingReply>,
    lifecycle: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl Harness {
    fn new(modules: Vec<Arc<dyn Module>>) -> Self {
        Self::with(modules, BotConfig::default(), Capabilities::NONE)
    }

    fn with(modules: Vec<Arc<dyn Module>>, config: BotConfig, caps: Capabilities) -> Self {
        let state = Arc::new(AppState::new(config, Arc::new(StaticResolver(caps))));

        let lifecycle = Arc::new(Mutex::new(Vec::new()));
        let sink = lifecycle.clone();
        state.emitter.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        let mut registry = ModuleRegistry::new(state.clone());
        for module in modules {
            registry.register(module).unwrap();
        }

        Self {
            dispatcher: Dispatcher::new(state, registry.freeze()),
            replies: Arc::new(RecordingReply::default()),
            lifecycle,
        }
    }

    fn state(&self) -> &Arc<AppState> {
        self.dispatcher.state()
    }

    fn message(&self, user_id: &str, text: &str) -> ChatEvent {
        ChatEvent::new(EventType::CREATED, "chan1", text, self.replies.clone())
            .with_guild("guild1")
            .with_user(user(user_id))
    }

    async fn ingest(&self, event: ChatEvent) {
        self.dispatcher.ingest(event).await;
        self.dispatcher.pool().wait_idle().await;
    }

    fn count(&self, pred: impl Fn(&LifecycleEvent) -> bool) -> usize {
        self.lifecycle.lock().unwrap().iter().filter(|e| pred(*e)).count()
    }

    fn commands_ran(&self, name: &str) -> usize {
        self.count(|e| matches!(e, LifecycleEvent::CommandRan(ran) if ran.command == name && ran.error.is_none()))
    }
}

fn user(id: &str) -> ChatUser {
    ChatUser { id: id.into(), name: id.into(), bot: false, member: None }
}

fn counting_passive(name: &str, hits: Arc<AtomicUsize>) -> Passive {
    Passive::new(name, move |_, _| {
        let hits = hits.clone();
        Box::pin(async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    })
}

#[tokio::test]
async fn ping_cooldown_is_per_actor() {
    let h = Harness::new(vec![Arc::new(GeneralModule)]);

    h.ingest(h.message("u1", "!ping")).await;
    h.ingest(h.message("u1", "!ping")).await;
    h.ingest(h.message("u2", "!ping")).await;

    assert_eq!(h.commands_ran("ping"), 2);
    assert_eq!(
        h.replies.sent(),
        vec![Replies::pong(), Replies::on_cooldown("u1", Duration::from_secs(2)), Replies::pong()]
    );
}

#[tokio::test(start_paused = true)]
async fn ping_is_available_again_after_cooldown() {
    let h = Harness::new(vec![Arc::new(GeneralModule)]);

    h.ingest(h.message("u1", "!ping")).await;
    tokio::time::advance(Duration::from_secs(3)).await;
    h.ingest(h.message("u1", "!ping")).await;

    assert_eq!(h.commands_ran("ping"), 2);
    assert!(h.state().cooldowns.check(&actor_key("u1", "ping")).is_some());
}

#[tokio::test]
async fn owner_only_command_denies_others() {
    let h = Harness::new(vec![Arc::new(ModerationModule::new().unwrap())]);

    h.ingest(h.message("u1", "!reset_cooldown u2:ping")).await;

    assert_eq!(h.commands_ran("reset_cooldown"), 0);
    assert_eq!(h.replies.sent(), vec![Replies::owner_only("u1", "reset_cooldown")]);
}

#[tokio::test]
async fn owner_clears_cooldown() {
    let config = BotConfig { owners: HashSet::from(["boss".to_string()]), ..BotConfig::default() };
    let h = Harness::with(vec![Arc::new(ModerationModule::new().unwrap())], config, Capabilities::NONE);
    let key = actor_key("u2", "ping");
    h.state().cooldowns.set(key.clone(), Duration::from_secs(60));

    h.ingest(h.message("boss", &format!("!reset_cooldown {key}"))).await;

    assert_eq!(h.commands_ran("reset_cooldown"), 1);
    assert!(h.state().cooldowns.check(&key).is_none());
    assert_eq!(h.replies.sent(), vec![Replies::cooldown_reset(&key)]);
}

#[tokio::test]
async fn reset_cooldown_without_key_replies_usage() {
    let config = BotConfig { owners: HashSet::from(["boss".to_string()]), ..BotConfig::default() };
    let h = Harness::with(vec![Arc::new(ModerationModule::new().unwrap())], config, Capabilities::NONE);

    h.ingest(h.message("boss", "!reset_cooldown")).await;

    assert_eq!(h.replies.sent(), vec![Replies::usage("!reset_cooldown <user:command>")]);
}

#[tokio::test]
async fn panicking_command_is_contained() {
    let boom = cmd!(
        Command::new("boom", |_, _| Box::pin(async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        })),
        "!boom"
    );
    let h = Harness::new(vec![Arc::new(CommandGroup::new("boom").command(boom)), Arc::new(GeneralModule)]);

    h.ingest(h.message("u1", "!boom")).await;
    h.ingest(h.message("u1", "!ping")).await;

    let panics: Vec<String> = h
        .lifecycle
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            LifecycleEvent::CommandPanicked(p) => Some(p.panic.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(panics.len(), 1);
    assert!(panics[0].contains("kaboom"));
    assert_eq!(h.commands_ran("boom"), 0);
    assert_eq!(h.commands_ran("ping"), 1);
}

#[tokio::test]
async fn failing_command_reports_error() {
    let fail = cmd!(
        Command::new("fail", |_, _| Box::pin(async {
            Err(modbot::bot::state::def::BotError::Custom("nope".into()))
        })),
        "!fail"
    );
    let h = Harness::new(vec![Arc::new(CommandGroup::new("m").command(fail))]);

    h.ingest(h.message("u1", "!fail")).await;

    assert_eq!(h.count(|e| matches!(e, LifecycleEvent::CommandRan(r) if r.error.as_deref() == Some("nope"))), 1);
}

#[tokio::test]
async fn event_type_masks_filter_commands_and_passives() {
    let hits = Arc::new(AtomicUsize::new(0));
    let module = CommandGroup::new("m")
        .command(cmd!(Command::new("hit", |_, _| Box::pin(async { Ok(()) })), "!hit"))
        .passive(counting_passive("deleted_only", hits.clone()).allowed_types(EventType::DELETED));
    let h = Harness::new(vec![Arc::new(module)]);

    let mut edited = h.message("u1", "!hit");
    edited.kind = EventType::UPDATED;
    h.ingest(edited).await;
    h.ingest(h.message("u1", "!hit")).await;

    assert_eq!(h.commands_ran("hit"), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn module_mask_excludes_whole_module() {
    let hits = Arc::new(AtomicUsize::new(0));
    let module = CommandGroup::new("deletes")
        .allowed_types(EventType::DELETED)
        .passive(counting_passive("any", hits.clone()).allowed_types(EventType::ALL));
    let h = Harness::new(vec![Arc::new(module)]);

    h.ingest(h.message("u1", "hello")).await;

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn passives_from_every_module_fire() {
    let (a, b) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
    let h = Harness::new(vec![
        Arc::new(CommandGroup::new("a").passive(counting_passive("watch", a.clone()))),
        Arc::new(CommandGroup::new("b").passive(counting_passive("watch", b.clone()))),
    ]);

    h.ingest(h.message("u1", "just chatting")).await;

    assert_eq!(a.load(Ordering::SeqCst), 1);
    assert_eq!(b.load(Ordering::SeqCst), 1);
    for module in ["a", "b"] {
        assert_eq!(
            h.count(|e| matches!(e, LifecycleEvent::PassiveRan(r) if r.module == module && r.passive == "watch" && r.error.is_none())),
            1
        );
    }
    assert_eq!(
        h.count(|e| matches!(e, LifecycleEvent::EventProcessed(p) if p.dispatched && p.passives_started == 2)),
        1
    );
}

#[tokio::test]
async fn panicking_passive_is_contained() {
    let boom = Passive::new("boom", |_, _| {
        Box::pin(async {
            if true {
                panic!("passive kaboom");
            }
            Ok(())
        })
    });
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Harness::new(vec![
        Arc::new(CommandGroup::new("a").passive(boom)),
        Arc::new(CommandGroup::new("b").passive(counting_passive("watch", hits.clone()))),
    ]);

    h.ingest(h.message("u1", "hi")).await;

    let panics = |h: &Harness| {
        h.count(|e| matches!(e, LifecycleEvent::PassivePanicked(p) if p.passive == "boom" && p.panic.contains("passive kaboom")))
    };
    assert_eq!(panics(&h), 1);
    assert_eq!(h.count(|e| matches!(e, LifecycleEvent::PassiveRan(r) if r.passive == "boom")), 0);

    h.ingest(h.message("u1", "still here")).await;

    assert_eq!(panics(&h), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(h.count(|e| matches!(e, LifecycleEvent::PassiveRan(r) if r.module == "b")), 2);
    assert_eq!(h.count(|e| matches!(e, LifecycleEvent::EventProcessed(p) if p.dispatched)), 2);
}

#[tokio::test]
async fn commands_only_run_for_event_types_in_their_mask() {
    let kinds = [EventType::CREATED, EventType::UPDATED, EventType::DELETED];

    for bits in 0u8..8 {
        let mask = kinds
            .iter()
            .enumerate()
            .filter(|(i, _)| bits & (1 << i) != 0)
            .fold(EventType::NONE, |acc, (_, kind)| acc | *kind);

        for kind in kinds {
            let hit = cmd!(Command::new("hit", |_, _| Box::pin(async { Ok(()) })).allowed_types(mask), "!hit");
            let h = Harness::new(vec![Arc::new(CommandGroup::new("m").command(hit))]);

            let mut event = h.message("u1", "!hit");
            event.kind = kind;
            h.ingest(event).await;

            assert_eq!(h.commands_ran("hit") == 1, kind.intersects(mask), "event {kind}, mask {mask}");
        }
    }
}

#[tokio::test]
async fn full_pool_keeps_routing_events() {
    let config = BotConfig { max_handlers: 1, ..BotConfig::default() };
    let h = Harness::with(vec![Arc::new(GeneralModule), Arc::new(InteractiveModule)], config, Capabilities::NONE);
    let key = session_key("chan1", "u1");

    h.dispatcher.ingest(h.message("u1", "!echo")).await;
    tokio::time::timeout(Duration::from_secs(1), async {
        while !h.state().callbacks.contains(&key) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    // The only slot is held by the waiting echo; routing must not wait for it.
    tokio::time::timeout(Duration::from_secs(1), h.dispatcher.ingest(h.message("u2", "!ping")))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), h.ingest(h.message("u1", "hello")))
        .await
        .unwrap();

    assert_eq!(h.replies.sent(), vec![Replies::echo_prompt("u1"), "hello".to_string(), Replies::pong()]);
    assert_eq!(h.commands_ran("echo"), 1);
    assert_eq!(h.commands_ran("ping"), 1);
}

#[tokio::test]
async fn bot_and_anonymous_events_are_dropped() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Harness::new(vec![
        Arc::new(GeneralModule),
        Arc::new(CommandGroup::new("watch").passive(counting_passive("all", hits.clone()))),
    ]);

    let mut from_bot = h.message("robot", "!ping");
    if let Some(user) = from_bot.user.as_mut() {
        user.bot = true;
    }
    h.ingest(from_bot).await;
    h.ingest(ChatEvent::new(EventType::DELETED, "chan1", "", h.replies.clone()).with_guild("guild1")).await;

    assert!(h.replies.sent().is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(h.count(|e| matches!(e, LifecycleEvent::EventProcessed(p) if !p.dispatched)), 2);
}

#[tokio::test]
async fn direct_messages_respect_module_and_command_policy() {
    let h = Harness::new(vec![Arc::new(GeneralModule), Arc::new(InteractiveModule)]);

    let dm = |text: &str| ChatEvent::new(EventType::CREATED, "dm1", text, h.replies.clone()).with_user(user("u1"));
    h.ingest(dm("!ping")).await;
    h.ingest(dm("!echo")).await;

    assert_eq!(h.commands_ran("ping"), 1);
    assert!(h.state().callbacks.is_empty());
    assert_eq!(h.replies.sent(), vec![Replies::pong()]);
}

#[tokio::test]
async fn required_capabilities_gate_commands() {
    let ban = || {
        CommandGroup::new("mod").command(cmd!(
            Command::new("ban", |_, _| Box::pin(async { Ok(()) }))
                .required_perms(Capabilities::from_bits(1 << 2))
                .actor_class(ActorClass::Elevated),
            "!ban"
        ))
    };

    let denied = Harness::new(vec![Arc::new(ban())]);
    denied.ingest(denied.message("u1", "!ban u2")).await;
    assert_eq!(denied.commands_ran("ban"), 0);
    assert!(denied.replies.sent().is_empty());

    let admin = Harness::with(vec![Arc::new(ban())], BotConfig::default(), Capabilities::ADMINISTRATOR);
    admin.ingest(admin.message("u1", "!ban u2")).await;
    assert_eq!(admin.commands_ran("ban"), 1);
}

#[tokio::test]
async fn event_processed_emitted_once_per_event() {
    let h = Harness::new(vec![Arc::new(GeneralModule), Arc::new(InteractiveModule)]);

    h.ingest(h.message("u1", "!ping")).await;
    h.ingest(h.message("u1", "nothing to see")).await;
    h.ingest(h.message("u2", "!stats")).await;

    assert_eq!(h.count(|e| matches!(e, LifecycleEvent::EventProcessed(_))), 3);
}

#[tokio::test]
async fn echo_waits_for_follow_up() {
    let h = Harness::new(vec![Arc::new(InteractiveModule)]);
    let key = session_key("chan1", "u1");

    h.dispatcher.ingest(h.message("u1", "!echo")).await;
    tokio::time::timeout(Duration::from_secs(1), async {
        while !h.state().callbacks.contains(&key) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    h.ingest(h.message("u1", "hello there")).await;

    assert_eq!(h.replies.sent(), vec![Replies::echo_prompt("u1"), "hello there".to_string()]);
    assert!(matches!(h.state().callbacks.get(&key), Err(CallbackError::NotFound(_))));
    assert_eq!(h.commands_ran("echo"), 1);
}

#[tokio::test(start_paused = true)]
async fn echo_times_out_without_follow_up() {
    let h = Harness::new(vec![Arc::new(InteractiveModule)]);

    h.ingest(h.message("u1", "!echo")).await;

    assert_eq!(h.replies.sent(), vec![Replies::echo_prompt("u1"), Replies::echo_timeout("u1")]);
    assert!(h.state().callbacks.is_empty());
}
