//! courier-core: shared types and collaborator contracts for the Courier
//! bot runtime.
//!
//! The runtime core never speaks a chat or database wire protocol itself.
//! Everything that crosses the process boundary goes through the two
//! capability traits defined here:
//!
//! - [`Outbound`]: deliver text or rich content to a channel, edit a
//!   previously sent message in place.
//! - [`DataStore`]: query and mutate opaque JSON documents.
//!
//! [`MemoryOutbound`] and [`MemoryStore`] implement both in memory for tests
//! and headless hosts.

pub mod config;
pub mod error;
pub mod memory;
pub mod outbound;
pub mod store;
pub mod types;

pub use config::{BotConfig, MessengerConfig, SessionsConfig};
pub use error::{CoreError, Result};
pub use memory::{MemoryOutbound, MemoryStore};
pub use outbound::{Embed, EmbedField, NavButtons, Outbound, ResponseBody};
pub use store::{DataStore, Document, DocumentId, Filter};
pub use types::{ChannelRef, ChatMessage, Interaction, InteractionData, MessageRef, OptionValue, WebhookEvent};
