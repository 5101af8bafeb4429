// Full-bot wiring: ping, help and ask driven through the trigger bus and
// dispatcher, the way a host process assembles them.

mod common;

use std::sync::Arc;

use courier_core::{ChannelRef, DataStore, MemoryOutbound, MemoryStore, Outbound};
use courier_plugins::{ArchivePlugin, AskPlugin, HelpPlugin, PingPlugin};
use courier_runtime::{Bot, Plugin, PluginRegistry, ServiceRegistry, Trigger, TriggerBus};

use common::*;

struct Rig {
    outbound: Arc<MemoryOutbound>,
    bot: Bot,
    publisher: courier_runtime::TriggerPublisher,
    ask: Arc<AskPlugin>,
}

async fn rig(ask_secs: u64) -> Rig {
    init_tracing();
    let config = test_config(30, ask_secs, 300);
    let outbound = Arc::new(MemoryOutbound::new());
    let store = Arc::new(MemoryStore::new());
    let outbound_cap: Arc<dyn Outbound> = outbound.clone();
    let store_cap: Arc<dyn DataStore> = store.clone();

    let ask = Arc::new(AskPlugin::new(Arc::clone(&config), Arc::clone(&outbound_cap)));
    let mut plugins = PluginRegistry::new();
    plugins
        .register(Arc::new(PingPlugin::new(
            Arc::clone(&config),
            Arc::clone(&outbound_cap),
        )))
        .unwrap();
    plugins
        .register(Arc::new(HelpPlugin::new(
            Arc::clone(&config),
            Arc::clone(&outbound_cap),
        )))
        .unwrap();
    plugins.register(Arc::clone(&ask) as Arc<dyn Plugin>).unwrap();
    plugins
        .register(Arc::new(ArchivePlugin::new(
            Arc::clone(&config),
            Arc::clone(&outbound_cap),
            store_cap,
        )))
        .unwrap();

    let bus = TriggerBus::new();
    let publisher = bus.publisher();
    let mut bot = Bot::new(config, ServiceRegistry::new(), plugins, bus);
    bot.run().await.unwrap();

    Rig {
        outbound,
        bot,
        publisher,
        ask,
    }
}

#[tokio::test]
async fn ping_answers_over_text_and_interaction() {
    let mut r = rig(15).await;

    r.publisher
        .publish(Trigger::message(message("u1", "c1", "$ping")))
        .await
        .unwrap();
    wait_until("pong", || saw_text(&r.outbound, "Pong!")).await;

    r.publisher
        .publish(Trigger::interaction(command("ping", "u1", "c2", &[])))
        .await
        .unwrap();
    wait_until("pong in c2", || {
        !r.outbound.texts_to(&ChannelRef::from("c2")).is_empty()
    })
    .await;

    r.bot.graceful_shutdown().await.unwrap();
}

#[tokio::test]
async fn help_aggregates_declared_capabilities() {
    let mut r = rig(15).await;

    r.publisher
        .publish(Trigger::message(message("u1", "c1", "$help")))
        .await
        .unwrap();
    wait_until("overview", || saw_text(&r.outbound, "**Available Commands**")).await;
    wait_until("lists archive", || saw_text(&r.outbound, "Archive online resources.")).await;
    wait_until("lists ping", || saw_text(&r.outbound, "Basic ping command")).await;

    // detailed help for one command
    r.publisher
        .publish(Trigger::message(message("u1", "c1", "$help save-site")))
        .await
        .unwrap();
    wait_until("save-site help", || saw_text(&r.outbound, "**save-site**")).await;

    // unknown command
    r.publisher
        .publish(Trigger::message(message("u1", "c1", "$help frobnicate")))
        .await
        .unwrap();
    wait_until("unknown command", || {
        saw_text(&r.outbound, "Can't find help for command frobnicate.")
    })
    .await;

    r.bot.graceful_shutdown().await.unwrap();
}

#[tokio::test]
async fn ask_session_advances_and_newer_command_aborts() {
    let mut r = rig(15).await;

    r.publisher
        .publish(Trigger::message(message("u1", "c1", "$ask")))
        .await
        .unwrap();
    wait_until("session opened", || saw_text(&r.outbound, "Ask session started!")).await;

    r.publisher
        .publish(Trigger::message(message("u1", "c1", "<@B1> next")))
        .await
        .unwrap();
    wait_until("step 1", || saw_text(&r.outbound, "Processed! step: 1")).await;

    r.publisher
        .publish(Trigger::message(message("u1", "c1", "<@B1> next")))
        .await
        .unwrap();
    wait_until("step 2", || saw_text(&r.outbound, "Processed! step: 2")).await;

    // malformed continuation re-prompts
    r.publisher
        .publish(Trigger::message(message("u1", "c1", "<@B1> proceed")))
        .await
        .unwrap();
    wait_until("re-prompt", || saw_text(&r.outbound, "Say \"next\" to advance.")).await;

    // a second $ask is the out-prioritizing command: old session aborted
    r.publisher
        .publish(Trigger::message(message("u1", "c1", "$ask")))
        .await
        .unwrap();
    wait_until("aborted", || {
        saw_text(&r.outbound, "aborting the active ask session")
    })
    .await;
    wait_until("no sessions left", || r.ask.active_sessions() == 0).await;

    r.bot.graceful_shutdown().await.unwrap();
}

#[tokio::test]
async fn idle_ask_session_expires() {
    let mut r = rig(1).await;

    r.publisher
        .publish(Trigger::message(message("u1", "c1", "$ask")))
        .await
        .unwrap();
    wait_until("session opened", || saw_text(&r.outbound, "Ask session started!")).await;
    wait_until("expired", || saw_text(&r.outbound, "closing the ask session")).await;
    wait_until("disposed", || r.ask.active_sessions() == 0).await;

    r.bot.graceful_shutdown().await.unwrap();
}
