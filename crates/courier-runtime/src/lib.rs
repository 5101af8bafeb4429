//! courier-runtime: the trigger bus, the component registries and the bot
//! dispatch loop.
//!
//! Services produce [`Trigger`]s through a [`TriggerPublisher`]; the [`Bot`]
//! fans every received trigger out to all registered [`Plugin`]s, each in its
//! own task. Shutdown is ordered: the bus is closed and drained first, then
//! services stop in reverse registration order.

pub mod bot;
pub mod bus;
pub mod error;
pub mod plugin;
pub mod service;

pub use bot::{Bot, BotContext};
pub use bus::{Trigger, TriggerBus, TriggerEvent, TriggerKind, TriggerPublisher};
pub use error::{Result, RuntimeError};
pub use plugin::{CommandHelp, Plugin, PluginHelp, PluginRegistry};
pub use service::{Service, ServiceRegistry, ServiceStatus};
