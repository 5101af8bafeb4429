use std::sync::Arc;

use courier_core::BotConfig;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{Trigger, TriggerBus};
use crate::error::Result;
use crate::plugin::PluginRegistry;
use crate::service::ServiceRegistry;

/// What a plugin sees of the process at delivery time: the immutable config
/// and both registries. Attached by the dispatcher, never by producers.
pub struct BotContext {
    pub config: Arc<BotConfig>,
    pub services: Arc<ServiceRegistry>,
    pub plugins: Arc<PluginRegistry>,
}

/// The assembled bot: registries, bus and the dispatch loop.
///
/// Lifecycle: build the registries, construct the bot, `run()`, and on the
/// host's termination signal `graceful_shutdown()`; which drains the
/// trigger bus first and then stops services in reverse start order.
pub struct Bot {
    context: Arc<BotContext>,
    bus: TriggerBus,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Bot {
    pub fn new(
        config: Arc<BotConfig>,
        services: ServiceRegistry,
        plugins: PluginRegistry,
        bus: TriggerBus,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            context: Arc::new(BotContext {
                config,
                services: Arc::new(services),
                plugins: Arc::new(plugins),
            }),
            bus,
            shutdown_tx,
            dispatcher: None,
        }
    }

    pub fn context(&self) -> Arc<BotContext> {
        Arc::clone(&self.context)
    }

    /// Start all services, then begin dispatching triggers.
    pub async fn run(&mut self) -> Result<()> {
        self.context.services.start_all().await?;
        let receiver = match self.bus.take_receiver() {
            Some(rx) => rx,
            None => {
                warn!("bot already running; ignoring second run()");
                return Ok(());
            }
        };
        let context = Arc::clone(&self.context);
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.dispatcher = Some(tokio::spawn(dispatch_loop(receiver, context, shutdown_rx)));
        info!("bot online");
        Ok(())
    }

    /// Ordered shutdown: close and drain the bus, then stop services in
    /// reverse registration order. Plugin tasks already spawned for
    /// in-flight triggers are not waited on.
    pub async fn graceful_shutdown(&mut self) -> Result<()> {
        info!("received termination signal, shutting down");
        let _ = self.shutdown_tx.send(true);
        if let Some(dispatcher) = self.dispatcher.take() {
            // dispatcher drains buffered triggers before exiting
            let _ = dispatcher.await;
        }
        self.context.services.stop_all().await?;
        info!("all services stopped");
        Ok(())
    }
}

/// The sole bus consumer. Every received trigger is fanned out to every
/// registered plugin in its own task; a panicking plugin takes down only its
/// own task, never the loop or the other plugins.
async fn dispatch_loop(
    mut receiver: mpsc::Receiver<Trigger>,
    context: Arc<BotContext>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    // stop accepting, then dispatch what is already queued
                    receiver.close();
                    while let Some(trigger) = receiver.recv().await {
                        dispatch(&context, trigger);
                    }
                    debug!("dispatch loop drained and stopped");
                    return;
                }
            }
            maybe = receiver.recv() => match maybe {
                Some(trigger) => dispatch(&context, trigger),
                // every publisher dropped: nothing can arrive anymore
                None => {
                    debug!("trigger bus closed, dispatch loop stopped");
                    return;
                }
            }
        }
    }
}

fn dispatch(context: &Arc<BotContext>, trigger: Trigger) {
    debug!(kind = %trigger.kind, "dispatching trigger");
    for plugin in context.plugins.plugins() {
        let plugin = Arc::clone(plugin);
        let context = Arc::clone(context);
        let trigger = trigger.clone();
        tokio::spawn(async move {
            plugin.handle(context, trigger).await;
        });
    }
}
