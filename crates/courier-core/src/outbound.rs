use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ChannelRef, Interaction, MessageRef};

/// Platform-agnostic rich content. The gateway collaborator translates this
/// into whatever its wire format calls an embed/card/attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }
}

/// Two-button page navigation attached to a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavButtons {
    /// Component id delivered back when the previous-page button is pressed.
    pub prev_id: String,
    /// Component id delivered back when the next-page button is pressed.
    pub next_id: String,
    /// When true both buttons render greyed-out and emit nothing.
    pub disabled: bool,
}

impl NavButtons {
    pub fn new(prev_id: impl Into<String>, next_id: impl Into<String>) -> Self {
        Self {
            prev_id: prev_id.into(),
            next_id: next_id.into(),
            disabled: false,
        }
    }

    pub fn locked(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// Body of a direct interaction response.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Text(String),
    Embed {
        embed: Embed,
        nav: Option<NavButtons>,
    },
}

/// Outbound delivery capability.
///
/// Methods take `&self` so a connected adapter can send from several tasks
/// concurrently. Edits must target a [`MessageRef`] returned by an earlier
/// send on the same adapter.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Deliver plain text to a channel.
    async fn send_text(&self, dest: &ChannelRef, text: &str) -> Result<MessageRef>;

    /// Deliver rich content, optionally with navigation buttons.
    async fn send_embed(
        &self,
        dest: &ChannelRef,
        embed: Embed,
        nav: Option<NavButtons>,
    ) -> Result<MessageRef>;

    /// Replace the content of a previously sent message in place.
    async fn edit_embed(
        &self,
        target: &MessageRef,
        embed: Embed,
        nav: Option<NavButtons>,
    ) -> Result<()>;

    /// Answer an interaction directly. Returns the ref of the produced
    /// message so it can be edited later.
    async fn respond(&self, interaction: &Interaction, body: ResponseBody) -> Result<MessageRef>;
}
