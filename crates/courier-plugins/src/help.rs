use std::sync::Arc;

use async_trait::async_trait;
use courier_command::CommandMatcher;
use courier_core::{BotConfig, InteractionData, Outbound, ResponseBody};
use courier_runtime::{
    BotContext, CommandHelp, Plugin, PluginHelp, Trigger, TriggerEvent, TriggerKind,
};
use tracing::warn;

/// Collects the help texts every plugin declares through the registry.
///
/// `$help` lists all plugins; `$help <command>` prints the matching command
/// help. The same works through the `help` interaction with a
/// `command-name` option.
pub struct HelpPlugin {
    config: Arc<BotConfig>,
    outbound: Arc<dyn Outbound>,
    matcher: CommandMatcher,
}

impl HelpPlugin {
    pub fn new(config: Arc<BotConfig>, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            config,
            outbound,
            matcher: CommandMatcher::new(["help"]),
        }
    }

    /// Browse every declared help capability and assemble the reply.
    fn help_text(cx: &BotContext, command_name: &str) -> String {
        let entries = cx.plugins.help_entries();
        if command_name.is_empty() {
            let mut text = String::from("**Available Commands**");
            for (plugin_name, help) in &entries {
                let mut names: Vec<&str> =
                    help.commands.iter().map(|c| c.name.as_str()).collect();
                names.sort_unstable();
                text.push_str(&format!(
                    "\n*{}*: {} Commands: {:?}",
                    plugin_name, help.summary, names
                ));
            }
            return text;
        }
        for (_, help) in &entries {
            if let Some(cmd) = help.commands.iter().find(|c| c.name == command_name) {
                return format!("**{}**\n{}", cmd.name, cmd.text);
            }
        }
        format!("Can't find help for command {command_name}.")
    }
}

#[async_trait]
impl Plugin for HelpPlugin {
    fn name(&self) -> &str {
        "help"
    }

    fn accepted(&self) -> &[TriggerKind] {
        &[TriggerKind::Chat]
    }

    fn help(&self) -> Option<PluginHelp> {
        Some(PluginHelp {
            summary: "Shows help for every registered command.".into(),
            commands: vec![CommandHelp {
                name: "help".into(),
                text: format!(
                    "*Call*: {}help [command-name]\nLists available commands, or the detailed help of one.",
                    self.config.messenger.prefix
                ),
            }],
        })
    }

    async fn handle(&self, cx: Arc<BotContext>, trigger: Trigger) {
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
                    .is_none()
                {
                    return;
                }
                let command_name = message
                    .content
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default();
                let text = Self::help_text(&cx, command_name);
                if let Err(e) = self.outbound.send_text(&message.channel(), &text).await {
                    warn!(error = %e, "failed to send help");
                }
            }
            TriggerEvent::Interaction(interaction) => {
                let InteractionData::Command { name, options } = &interaction.data else {
                    return;
                };
                if name != "help" {
                    return;
                }
                let command_name = options
                    .get("command-name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let text = Self::help_text(&cx, command_name);
                if let Err(e) = self
                    .outbound
                    .respond(&interaction, ResponseBody::Text(text))
                    .await
                {
                    warn!(error = %e, "failed to answer help interaction");
                }
            }
            TriggerEvent::Webhook(_) => {}
        }
    }
}
