use chrono::{DateTime, Utc};
use courier_core::{Document, EmbedField};
use courier_stages::PagerItem;
use serde::{Deserialize, Serialize};

/// Collection name the archive feature persists into.
pub const SITE_COLLECTION: &str = "site_archive";

/// One archived site: the record accumulated across a save session or built
/// in one shot from an explicit command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub note: String,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl SiteRecord {
    pub fn new(
        url: impl Into<String>,
        guild_id: Option<String>,
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            url: url.into(),
            tags: Vec::new(),
            note: String::new(),
            guild_id,
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// The quoted site/tags/note block used in confirmations.
    pub fn essential_info(&self) -> String {
        let tags = if self.tags.is_empty() {
            "*None*".to_string()
        } else {
            format!("[{}]", self.tags.join(","))
        };
        let note = if self.note.is_empty() {
            "*None*"
        } else {
            self.note.as_str()
        };
        format!("> Site: {}\n> Tags: {}\n> Note: {}", self.url, tags, note)
    }

    pub fn to_document(&self) -> courier_core::Result<Document> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_document(doc: Document) -> courier_core::Result<Self> {
        Ok(serde_json::from_value(doc)?)
    }
}

impl PagerItem for SiteRecord {
    fn to_embed_field(&self, display_id: usize) -> EmbedField {
        EmbedField {
            name: format!("{}. {}", display_id, self.url),
            value: self.essential_info(),
            inline: false,
        }
    }
}
