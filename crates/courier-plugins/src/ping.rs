use std::sync::Arc;

use async_trait::async_trait;
use courier_command::CommandMatcher;
use courier_core::{BotConfig, InteractionData, Outbound, ResponseBody};
use courier_runtime::{
    BotContext, CommandHelp, Plugin, PluginHelp, Trigger, TriggerEvent, TriggerKind,
};
use tracing::warn;

/// Basic liveness check: `$ping` or the `ping` interaction answer "Pong!".
pub struct PingPlugin {
    config: Arc<BotConfig>,
    outbound: Arc<dyn Outbound>,
    matcher: CommandMatcher,
}

impl PingPlugin {
    pub fn new(config: Arc<BotConfig>, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            config,
            outbound,
            matcher: CommandMatcher::new(["ping"]),
        }
    }
}

#[async_trait]
impl Plugin for PingPlugin {
    fn name(&self) -> &str {
        "ping"
    }

    fn accepted(&self) -> &[TriggerKind] {
        &[TriggerKind::Chat]
    }

    fn help(&self) -> Option<PluginHelp> {
        Some(PluginHelp {
            summary: "Basic ping command for Courier.".into(),
            commands: vec![CommandHelp {
                name: "ping".into(),
                text: format!(
                    "*Call*: {}ping or the ping interaction\nResponds with \"Pong!\"",
                    self.config.messenger.prefix
                ),
            }],
        })
    }

    async fn handle(&self, _cx: Arc<BotContext>, trigger: Trigger) {
        if !self.accepts(trigger.kind) {
            return;
        }
        match trigger.event {
            TriggerEvent::Message(message) => {
                if message.author_is_bot {
                    return;
                }
                if self
                    .matcher
                    .match_text(&message.content, &self.config.messenger)
                    .is_some()
                {
                    if let Err(e) = self.outbound.send_text(&message.channel(), "Pong!").await {
                        warn!(error = %e, "failed to answer ping");
                    }
                }
            }
            TriggerEvent::Interaction(interaction) => {
                if let InteractionData::Command { name, .. } = &interaction.data {
                    if name == "ping" {
                        if let Err(e) = self
                            .outbound
                            .respond(&interaction, ResponseBody::Text("Pong!".into()))
                            .await
                        {
                            warn!(error = %e, "failed to answer ping interaction");
                        }
                    }
                }
            }
            TriggerEvent::Webhook(_) => {}
        }
    }
}
