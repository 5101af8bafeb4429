// Exercises the dispatch fan-out, registry ordering and ordered shutdown
// guarantees end to end, with in-process test services and plugins.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use courier_core::{BotConfig, ChatMessage};
use courier_runtime::{
    Bot, BotContext, Plugin, PluginRegistry, RuntimeError, Service, ServiceRegistry, ServiceStatus,
    Trigger, TriggerBus, TriggerKind,
};

fn message(content: &str) -> ChatMessage {
    ChatMessage {
        message_id: "m1".into(),
        channel_id: "c1".into(),
        guild_id: None,
        author_id: "u1".into(),
        author_is_bot: false,
        content: content.into(),
        timestamp: Utc::now(),
    }
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

// ---------------------------------------------------------------------------
// test doubles
// ---------------------------------------------------------------------------

struct CountingPlugin {
    name: String,
    kinds: Vec<TriggerKind>,
    hits: Arc<AtomicUsize>,
}

impl CountingPlugin {
    fn chat(name: &str, hits: Arc<AtomicUsize>) -> Self {
        Self {
            name: name.into(),
            kinds: vec![TriggerKind::Chat],
            hits,
        }
    }
}

#[async_trait]
impl Plugin for CountingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepted(&self) -> &[TriggerKind] {
        &self.kinds
    }

    async fn handle(&self, _cx: Arc<BotContext>, trigger: Trigger) {
        if !self.accepts(trigger.kind) {
            return;
        }
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

struct PanickingPlugin;

#[async_trait]
impl Plugin for PanickingPlugin {
    fn name(&self) -> &str {
        "panicker"
    }

    fn accepted(&self) -> &[TriggerKind] {
        &[TriggerKind::Chat]
    }

    async fn handle(&self, _cx: Arc<BotContext>, _trigger: Trigger) {
        panic!("deliberate test panic");
    }
}

struct OrderedService {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    fail_stop: bool,
}

#[async_trait]
impl Service for OrderedService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> courier_core::Result<()> {
        self.log.lock().unwrap().push(format!("start:{}", self.name));
        Ok(())
    }

    async fn stop(&self) -> courier_core::Result<()> {
        if self.fail_stop {
            return Err(courier_core::CoreError::Outbound("stop exploded".into()));
        }
        self.log.lock().unwrap().push(format!("stop:{}", self.name));
        Ok(())
    }

    fn status(&self) -> ServiceStatus {
        ServiceStatus::Running
    }
}

struct OtherService;

#[async_trait]
impl Service for OtherService {
    fn name(&self) -> &str {
        "other"
    }

    async fn start(&self) -> courier_core::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> courier_core::Result<()> {
        Ok(())
    }

    fn status(&self) -> ServiceStatus {
        ServiceStatus::Created
    }
}

// ---------------------------------------------------------------------------
// dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fanout_reaches_every_plugin_exactly_once() {
    let mut plugins = PluginRegistry::new();
    let mut hit_counters = Vec::new();
    for i in 0..5 {
        let hits = Arc::new(AtomicUsize::new(0));
        hit_counters.push(Arc::clone(&hits));
        plugins
            .register(Arc::new(CountingPlugin::chat(&format!("counter-{i}"), hits)))
            .unwrap();
    }

    let bus = TriggerBus::new();
    let publisher = bus.publisher();
    let mut bot = Bot::new(
        Arc::new(BotConfig::default()),
        ServiceRegistry::new(),
        plugins,
        bus,
    );
    bot.run().await.unwrap();

    publisher.publish(Trigger::message(message("hello"))).await.unwrap();

    wait_until("every plugin saw the trigger", || {
        hit_counters
            .iter()
            .all(|c| c.load(Ordering::SeqCst) == 1)
    })
    .await;

    // no double delivery shows up later
    tokio::time::sleep(Duration::from_millis(50)).await;
    for counter in &hit_counters {
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn panicking_plugin_does_not_block_the_others() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut plugins = PluginRegistry::new();
    plugins.register(Arc::new(PanickingPlugin)).unwrap();
    plugins
        .register(Arc::new(CountingPlugin::chat("survivor", Arc::clone(&hits))))
        .unwrap();

    let bus = TriggerBus::new();
    let publisher = bus.publisher();
    let mut bot = Bot::new(
        Arc::new(BotConfig::default()),
        ServiceRegistry::new(),
        plugins,
        bus,
    );
    bot.run().await.unwrap();

    for _ in 0..3 {
        publisher.publish(Trigger::message(message("boom"))).await.unwrap();
    }

    wait_until("survivor saw all triggers", || {
        hits.load(Ordering::SeqCst) == 3
    })
    .await;
}

#[tokio::test]
async fn shutdown_drains_buffered_triggers() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut plugins = PluginRegistry::new();
    plugins
        .register(Arc::new(CountingPlugin::chat("drainee", Arc::clone(&hits))))
        .unwrap();

    let bus = TriggerBus::new();
    let publisher = bus.publisher();
    let mut bot = Bot::new(
        Arc::new(BotConfig::default()),
        ServiceRegistry::new(),
        plugins,
        bus,
    );
    bot.run().await.unwrap();

    for _ in 0..10 {
        publisher.publish(Trigger::message(message("queued"))).await.unwrap();
    }
    bot.graceful_shutdown().await.unwrap();

    wait_until("all queued triggers dispatched", || {
        hits.load(Ordering::SeqCst) == 10
    })
    .await;

    // the bus no longer accepts publishes
    assert!(matches!(
        publisher.publish(Trigger::message(message("late"))).await,
        Err(RuntimeError::BusClosed)
    ));
}

// ---------------------------------------------------------------------------
// registries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn services_stop_in_reverse_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut services = ServiceRegistry::new();
    for name in ["alpha", "beta", "gamma"] {
        services
            .register(Arc::new(OrderedService {
                name: name.into(),
                log: Arc::clone(&log),
                fail_stop: false,
            }))
            .unwrap();
    }

    services.start_all().await.unwrap();
    services.stop_all().await.unwrap();

    let log = log.lock().unwrap();
    let stops: Vec<&str> = log
        .iter()
        .filter(|entry| entry.starts_with("stop:"))
        .map(String::as_str)
        .collect();
    assert_eq!(stops, ["stop:gamma", "stop:beta", "stop:alpha"]);
    // all three started, in whatever interleaving
    assert_eq!(log.iter().filter(|e| e.starts_with("start:")).count(), 3);
}

#[tokio::test]
async fn failing_stop_aborts_shutdown_and_names_the_component() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut services = ServiceRegistry::new();
    services
        .register(Arc::new(OrderedService {
            name: "first".into(),
            log: Arc::clone(&log),
            fail_stop: false,
        }))
        .unwrap();
    services
        .register(Arc::new(OrderedService {
            name: "fragile".into(),
            log: Arc::clone(&log),
            fail_stop: true,
        }))
        .unwrap();

    let err = services.stop_all().await.unwrap_err();
    match err {
        RuntimeError::StopFailed { name, .. } => assert_eq!(name, "fragile"),
        other => panic!("expected StopFailed, got {other:?}"),
    }
    // "first" was never reached: the failure aborted the remainder
    assert!(log.lock().unwrap().iter().all(|e| !e.starts_with("stop:first")));
}

#[tokio::test]
async fn registry_rejects_duplicates_and_resolves_types() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut services = ServiceRegistry::new();
    services
        .register(Arc::new(OrderedService {
            name: "alpha".into(),
            log: Arc::clone(&log),
            fail_stop: false,
        }))
        .unwrap();
    services.register(Arc::new(OtherService)).unwrap();

    // duplicate name tag
    let err = services
        .register(Arc::new(OrderedService {
            name: "alpha".into(),
            log: Arc::clone(&log),
            fail_stop: false,
        }))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::DuplicateComponent(name) if name == "alpha"));

    // typed fetch round-trips
    let fetched = services.fetch::<OrderedService>("alpha").unwrap();
    assert_eq!(fetched.name(), "alpha");

    // unknown name
    assert!(matches!(
        services.fetch::<OrderedService>("missing"),
        Err(RuntimeError::UnknownComponent(_))
    ));

    // right name, wrong type
    assert!(matches!(
        services.fetch::<OrderedService>("other"),
        Err(RuntimeError::ComponentType(_))
    ));
}

#[tokio::test]
async fn plugin_registry_rejects_duplicate_names() {
    let mut plugins = PluginRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));
    plugins
        .register(Arc::new(CountingPlugin::chat("ping", Arc::clone(&hits))))
        .unwrap();
    let err = plugins
        .register(Arc::new(CountingPlugin::chat("ping", hits)))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::DuplicateComponent(_)));
}

// ---------------------------------------------------------------------------
// bus semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plugins_filter_by_declared_kind() {
    let chat_hits = Arc::new(AtomicUsize::new(0));
    let webhook_hits = Arc::new(AtomicUsize::new(0));
    let mut plugins = PluginRegistry::new();
    plugins
        .register(Arc::new(CountingPlugin::chat("chat-only", Arc::clone(&chat_hits))))
        .unwrap();
    plugins
        .register(Arc::new(CountingPlugin {
            name: "webhook-only".into(),
            kinds: vec![TriggerKind::Webhook],
            hits: Arc::clone(&webhook_hits),
        }))
        .unwrap();

    let bus = TriggerBus::new();
    let publisher = bus.publisher();
    let mut bot = Bot::new(
        Arc::new(BotConfig::default()),
        ServiceRegistry::new(),
        plugins,
        bus,
    );
    bot.run().await.unwrap();

    publisher
        .publish(Trigger::webhook(courier_core::WebhookEvent {
            source: "github".into(),
            payload: serde_json::json!({"action": "push"}),
        }))
        .await
        .unwrap();

    wait_until("webhook plugin saw it", || {
        webhook_hits.load(Ordering::SeqCst) == 1
    })
    .await;
    // the chat plugin was handed the trigger too but declared no interest
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(chat_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn full_bus_applies_backpressure_instead_of_dropping() {
    // no dispatcher is running, so the channel fills to capacity
    let bus = TriggerBus::new();
    let publisher = bus.publisher();
    for _ in 0..100 {
        publisher.publish(Trigger::message(message("fill"))).await.unwrap();
    }
    // the 101st publish must block, not fail or drop
    let blocked = tokio::time::timeout(
        Duration::from_millis(100),
        publisher.publish(Trigger::message(message("overflow"))),
    )
    .await;
    assert!(blocked.is_err(), "publish into a full bus should block");
}

// ---------------------------------------------------------------------------
// startup failure semantics
// ---------------------------------------------------------------------------

struct FailingStartService;

#[async_trait]
impl Service for FailingStartService {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn start(&self) -> courier_core::Result<()> {
        Err(courier_core::CoreError::Config("bad credentials".into()))
    }

    async fn stop(&self) -> courier_core::Result<()> {
        Ok(())
    }

    fn status(&self) -> ServiceStatus {
        ServiceStatus::Created
    }
}

struct PanickingStartService;

#[async_trait]
impl Service for PanickingStartService {
    fn name(&self) -> &str {
        "kaboom"
    }

    async fn start(&self) -> courier_core::Result<()> {
        panic!("start exploded");
    }

    async fn stop(&self) -> courier_core::Result<()> {
        Ok(())
    }

    fn status(&self) -> ServiceStatus {
        ServiceStatus::Created
    }
}

#[tokio::test]
async fn failing_start_aborts_startup_and_names_the_component() {
    let mut services = ServiceRegistry::new();
    services.register(Arc::new(FailingStartService)).unwrap();
    let err = services.start_all().await.unwrap_err();
    match err {
        RuntimeError::StartFailed { name, reason } => {
            assert_eq!(name, "flaky");
            assert!(reason.contains("bad credentials"));
        }
        other => panic!("expected StartFailed, got {other:?}"),
    }
}

#[tokio::test]
#[should_panic(expected = "service start panicked")]
async fn panicking_start_is_fatal() {
    let mut services = ServiceRegistry::new();
    services.register(Arc::new(PanickingStartService)).unwrap();
    let _ = services.start_all().await;
}
