// Shared fixtures for the plugin integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use courier_core::{
    BotConfig, ChatMessage, Interaction, InteractionData, MemoryOutbound, OptionValue,
};
use courier_runtime::{BotContext, PluginRegistry, ServiceRegistry};

static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Route library logs through `RUST_LOG` while debugging a test.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

pub fn test_config(save_secs: u64, ask_secs: u64, pager_secs: u64) -> Arc<BotConfig> {
    let mut config = BotConfig::default();
    config.messenger.bot_id = "B1".into();
    config.sessions.save_overtime_secs = save_secs;
    config.sessions.ask_overtime_secs = ask_secs;
    config.sessions.pager_overtime_secs = pager_secs;
    Arc::new(config)
}

pub fn empty_context(config: Arc<BotConfig>) -> Arc<BotContext> {
    Arc::new(BotContext {
        config,
        services: Arc::new(ServiceRegistry::new()),
        plugins: Arc::new(PluginRegistry::new()),
    })
}

pub fn message(author: &str, channel: &str, content: &str) -> ChatMessage {
    ChatMessage {
        message_id: format!("tm{}", MESSAGE_SEQ.fetch_add(1, Ordering::SeqCst)),
        channel_id: channel.into(),
        guild_id: Some("g1".into()),
        author_id: author.into(),
        author_is_bot: false,
        content: content.into(),
        timestamp: chrono::Utc::now(),
    }
}

pub fn command(
    name: &str,
    user: &str,
    channel: &str,
    options: &[(&str, OptionValue)],
) -> Interaction {
    Interaction {
        interaction_id: format!("ti{}", MESSAGE_SEQ.fetch_add(1, Ordering::SeqCst)),
        channel_id: channel.into(),
        guild_id: Some("g1".into()),
        user_id: user.into(),
        data: InteractionData::Command {
            name: name.into(),
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        },
    }
}

pub fn component(custom_id: &str, message_id: &str, user: &str, channel: &str) -> Interaction {
    Interaction {
        interaction_id: format!("ti{}", MESSAGE_SEQ.fetch_add(1, Ordering::SeqCst)),
        channel_id: channel.into(),
        guild_id: Some("g1".into()),
        user_id: user.into(),
        data: InteractionData::Component {
            custom_id: custom_id.into(),
            message_id: message_id.into(),
        },
    }
}

pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

/// Whether any text delivered so far contains the needle.
pub fn saw_text(outbound: &MemoryOutbound, needle: &str) -> bool {
    outbound
        .sent()
        .iter()
        .any(|m| m.body.as_text().is_some_and(|t| t.contains(needle)))
}
