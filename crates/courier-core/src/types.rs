use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque destination for outbound delivery.
///
/// The core never interprets the inner string; it is whatever the gateway
/// collaborator uses to address a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef(pub String);

impl ChannelRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Handle to a message previously produced by an [`Outbound`] send.
///
/// In-place edits must target one of these; the core never fabricates them.
///
/// [`Outbound`]: crate::outbound::Outbound
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub message_id: String,
    pub channel: ChannelRef,
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel, self.message_id)
    }
}

/// A plain chat message as delivered by a gateway service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub author_id: String,
    /// True when the author is a bot account (including ourselves).
    pub author_is_bot: bool,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// The channel this message arrived in, as an outbound destination.
    pub fn channel(&self) -> ChannelRef {
        ChannelRef(self.channel_id.clone())
    }
}

/// A structured interaction: a named command invocation or a component press.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub interaction_id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub user_id: String,
    pub data: InteractionData,
}

impl Interaction {
    pub fn channel(&self) -> ChannelRef {
        ChannelRef(self.channel_id.clone())
    }
}

/// What kind of interaction arrived. Closed set; plugins match on the
/// variant instead of probing payload shapes at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InteractionData {
    /// A named (slash-style) command with parsed options.
    Command {
        name: String,
        options: HashMap<String, OptionValue>,
    },
    /// A component press on a previously sent message (e.g. a nav button).
    Component {
        custom_id: String,
        message_id: String,
    },
}

/// A typed option value attached to a named command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Payload delivered by a webhook receiver service.
///
/// The core routes it without interpreting the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Which configured webhook source produced this (e.g. `"github"`).
    pub source: String,
    pub payload: serde_json::Value,
}
