use std::sync::Arc;

use async_trait::async_trait;
use courier_command::{calling_bot, CommandMatcher};
use courier_core::{BotConfig, ChannelRef, ChatMessage, Outbound};
use courier_runtime::{
    BotContext, CommandHelp, Plugin, PluginHelp, Trigger, TriggerEvent, TriggerKind,
};
use courier_stages::{CombinedKey, Stage, StageEvent, StageHandle, StageRx, StageSignal, StageStore};
use tracing::{debug, warn};

/// The demo stepped-dialogue session, keyed by user id alone.
///
/// `$ask` opens a session; every `@bot next` reply advances the step counter
/// and is acknowledged. Silence beyond the configured overtime ends the
/// session; sending `$ask` again while one is active force-aborts the old
/// one (the newer request wins).
pub struct AskPlugin {
    config: Arc<BotConfig>,
    outbound: Arc<dyn Outbound>,
    matcher: CommandMatcher,
    stages: Arc<StageStore<AskStage>>,
}

struct AskStage {
    handle: StageHandle,
}

impl Stage for AskStage {
    fn handle(&self) -> &StageHandle {
        &self.handle
    }
}

impl AskPlugin {
    pub fn new(config: Arc<BotConfig>, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            config,
            outbound,
            matcher: CommandMatcher::new(["ask"]),
            stages: Arc::new(StageStore::new()),
        }
    }

    /// Number of live ask sessions. Exposed for the host's diagnostics.
    pub fn active_sessions(&self) -> usize {
        self.stages.len()
    }

    async fn say(&self, channel: &ChannelRef, text: &str) {
        if let Err(e) = self.outbound.send_text(channel, text).await {
            warn!(error = %e, "ask: outbound send failed");
        }
    }

    async fn open_session(&self, message: &ChatMessage) {
        let key = CombinedKey::join([message.author_id.as_str()]);
        let overtime = self.config.sessions.ask_overtime();
        let mut inbox = None;
        let created = self.stages.try_create(key.clone(), || {
            let (handle, rx) = StageHandle::channel(
                key.clone(),
                &message.author_id,
                &message.channel_id,
                overtime,
            );
            inbox = Some(rx);
            AskStage { handle }
        });

        match created {
            Err(e) => self.say(&message.channel(), &e.to_string()).await,
            Ok(stage) => {
                if let Some(inbox) = inbox {
                    self.say(
                        &message.channel(),
                        &format!(
                            "Ask session started! Reply with the @bot mention and \"next\" to advance. \
                             Expires after {}s of silence.",
                            overtime.as_secs()
                        ),
                    )
                    .await;
                    let loop_ctx = AskLoop {
                        config: Arc::clone(&self.config),
                        outbound: Arc::clone(&self.outbound),
                        stages: Arc::clone(&self.stages),
                        stage,
                        key,
                        channel: message.channel(),
                    };
                    tokio::spawn(loop_ctx.run(inbox));
                }
            }
        }
    }
}

struct AskLoop {
    config: Arc<BotConfig>,
    outbound: Arc<dyn Outbound>,
    stages: Arc<StageStore<AskStage>>,
    stage: Arc<AskStage>,
    key: CombinedKey,
    channel: ChannelRef,
}

impl AskLoop {
    async fn say(&self, text: &str) {
        if let Err(e) = self.outbound.send_text(&self.channel, text).await {
            warn!(error = %e, "ask: outbound send failed");
        }
    }

    async fn run(self, mut inbox: StageRx) {
        loop {
            match inbox.next().await {
                StageSignal::Event(StageEvent::Message(message)) => {
                    let Some(content) = calling_bot(&message.content, &self.config.messenger)
                    else {
                        continue;
                    };
                    if content == "next" {
                        let step = self.stage.handle.step() + 1;
                        self.stage.handle.set_step(step);
                        self.say(&format!("Processed! step: {step}")).await;
                    } else {
                        // malformed answer: re-prompt, never abort
                        self.say("Say \"next\" to advance.").await;
                    }
                }
                StageSignal::Event(StageEvent::Component(_)) => continue,
                StageSignal::Timeout => {
                    self.say(&format!(
                        "{}s of silence, closing the ask session.",
                        inbox.overtime().as_secs()
                    ))
                    .await;
                    break;
                }
                StageSignal::Cancelled => {
                    debug!(key = %self.key, "ask session force-aborted");
                    break;
                }
            }
        }
        self.stages.dispose(&self.key);
    }
}

#[async_trait]
impl Plugin for AskPlugin {
    fn name(&self) -> &str {
        "ask"
    }

    fn accepted(&self) -> &[TriggerKind] {
        &[TriggerKind::Chat]
    }

    fn help(&self) -> Option<PluginHelp> {
        Some(PluginHelp {
            summary: "Stepped question-and-answer demo session.".into(),
            commands: vec![CommandHelp {
                name: "ask".into(),
                text: format!(
                    "*Call*: {}ask\nOpens a per-user session; reply \"@bot next\" to advance.",
                    self.config.messenger.prefix
                ),
            }],
        })
    }

    async fn handle(&self, _cx: Arc<BotContext>, trigger: Trigger) {
        if !self.accepts(trigger.kind) {
            return;
        }
        let TriggerEvent::Message(message) = trigger.event else {
            return;
        };
        if message.author_is_bot {
            return;
        }

        let key = CombinedKey::join([message.author_id.as_str()]);
        let is_ask_command = self
            .matcher
            .match_text(&message.content, &self.config.messenger)
            .is_some();

        if let Some(stage) = self.stages.get(&key) {
            if is_ask_command {
                // explicit command out-prioritizes the running session
                self.stages.dispose(&key);
                self.say(
                    &message.channel(),
                    "Detected another command, aborting the active ask session.",
                )
                .await;
                return;
            }
            if calling_bot(&message.content, &self.config.messenger).is_some() {
                if let Err(e) = stage
                    .handle()
                    .forward(StageEvent::Message(message.clone()))
                    .await
                {
                    debug!(error = %e, "ask: continuation arrived after disposal");
                }
            }
            return;
        }

        if is_ask_command {
            self.open_session(&message).await;
        }
    }
}
