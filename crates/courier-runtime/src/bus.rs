use std::fmt;

use courier_core::config::BUS_CAPACITY;
use courier_core::{ChatMessage, Interaction, WebhookEvent};
use tokio::sync::mpsc;

use crate::error::{Result, RuntimeError};

/// Which family of service produced a trigger. Plugins route on this tag
/// alone; the payload stays opaque to the dispatch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// Chat gateway traffic: messages and interactions.
    Chat,
    /// An authenticated webhook delivery.
    Webhook,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Chat => f.write_str("chat"),
            TriggerKind::Webhook => f.write_str("webhook"),
        }
    }
}

/// The payload of a trigger. A closed set of tagged variants; plugins match
/// on the variant they declared interest in, nothing is downcast at runtime.
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    Message(ChatMessage),
    Interaction(Interaction),
    Webhook(WebhookEvent),
}

/// An event handed from a service to the dispatch bus.
///
/// Immutable after creation. Producers never attach any bot back-reference;
/// the dispatcher supplies the [`BotContext`](crate::bot::BotContext) at
/// delivery time.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub event: TriggerEvent,
}

impl Trigger {
    pub fn message(message: ChatMessage) -> Self {
        Self {
            kind: TriggerKind::Chat,
            event: TriggerEvent::Message(message),
        }
    }

    pub fn interaction(interaction: Interaction) -> Self {
        Self {
            kind: TriggerKind::Chat,
            event: TriggerEvent::Interaction(interaction),
        }
    }

    pub fn webhook(event: WebhookEvent) -> Self {
        Self {
            kind: TriggerKind::Webhook,
            event: TriggerEvent::Webhook(event),
        }
    }
}

/// The shared trigger channel. One consumer (the bot's dispatch loop), any
/// number of producing services.
pub struct TriggerBus {
    tx: mpsc::Sender<Trigger>,
    rx: Option<mpsc::Receiver<Trigger>>,
}

impl TriggerBus {
    /// A bus bounded at [`BUS_CAPACITY`] triggers.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(BUS_CAPACITY);
        Self { tx, rx: Some(rx) }
    }

    /// A cloneable publishing handle, given to trigger-producing services at
    /// construction time.
    pub fn publisher(&self) -> TriggerPublisher {
        TriggerPublisher {
            tx: self.tx.clone(),
        }
    }

    /// The dispatcher's sole consumer view. Yields once.
    pub(crate) fn take_receiver(&mut self) -> Option<mpsc::Receiver<Trigger>> {
        self.rx.take()
    }
}

impl Default for TriggerBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer handle onto the bus.
#[derive(Clone)]
pub struct TriggerPublisher {
    tx: mpsc::Sender<Trigger>,
}

impl TriggerPublisher {
    /// Enqueue a trigger for dispatch.
    ///
    /// When the bus is full this *waits* rather than dropping: under
    /// sustained overload producers block, but no event is silently lost.
    pub async fn publish(&self, trigger: Trigger) -> Result<()> {
        self.tx
            .send(trigger)
            .await
            .map_err(|_| RuntimeError::BusClosed)
    }
}
