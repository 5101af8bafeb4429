//! In-memory loopback implementations of the collaborator capabilities.
//!
//! Used by the test suites throughout the workspace and by headless hosts
//! that want the full session machinery without a real gateway or database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::outbound::{Embed, NavButtons, Outbound, ResponseBody};
use crate::store::{DataStore, Document, DocumentId, Filter};
use crate::types::{ChannelRef, Interaction, MessageRef};

/// A message captured by [`MemoryOutbound`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub msg_ref: MessageRef,
    pub body: SentBody,
    /// How many times the message has been edited in place.
    pub edits: u32,
}

#[derive(Debug, Clone)]
pub enum SentBody {
    Text(String),
    Embed {
        embed: Embed,
        nav: Option<NavButtons>,
    },
}

impl SentBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SentBody::Text(t) => Some(t),
            SentBody::Embed { .. } => None,
        }
    }

    pub fn as_embed(&self) -> Option<(&Embed, Option<&NavButtons>)> {
        match self {
            SentBody::Embed { embed, nav } => Some((embed, nav.as_ref())),
            SentBody::Text(_) => None,
        }
    }
}

#[derive(Default)]
struct OutboundLog {
    seq: u64,
    messages: Vec<SentMessage>,
    index: HashMap<MessageRef, usize>,
}

/// Loopback [`Outbound`] that records everything it is asked to deliver.
///
/// `fail_next` can be armed to make the next call error, for exercising the
/// collaborator-failure paths without a flaky gateway.
#[derive(Default)]
pub struct MemoryOutbound {
    log: Mutex<OutboundLog>,
    fail_next: AtomicBool,
}

impl MemoryOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure: the next outbound call returns an error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.log.lock().unwrap().messages.clone()
    }

    /// Plain-text bodies delivered to `channel`, in order.
    pub fn texts_to(&self, channel: &ChannelRef) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| &m.msg_ref.channel == channel)
            .filter_map(|m| m.body.as_text().map(String::from))
            .collect()
    }

    /// Current state of a previously sent message.
    pub fn message(&self, target: &MessageRef) -> Option<SentMessage> {
        let log = self.log.lock().unwrap();
        log.index.get(target).map(|&i| log.messages[i].clone())
    }

    fn check_fail(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CoreError::Outbound("injected failure".into()));
        }
        Ok(())
    }

    fn record(&self, channel: ChannelRef, body: SentBody) -> MessageRef {
        let mut log = self.log.lock().unwrap();
        log.seq += 1;
        let msg_ref = MessageRef {
            message_id: format!("m{}", log.seq),
            channel,
        };
        let idx = log.messages.len();
        debug!(msg_ref = %msg_ref, "loopback delivery");
        log.messages.push(SentMessage {
            msg_ref: msg_ref.clone(),
            body,
            edits: 0,
        });
        log.index.insert(msg_ref.clone(), idx);
        msg_ref
    }
}

#[async_trait]
impl Outbound for MemoryOutbound {
    async fn send_text(&self, dest: &ChannelRef, text: &str) -> Result<MessageRef> {
        self.check_fail()?;
        Ok(self.record(dest.clone(), SentBody::Text(text.to_string())))
    }

    async fn send_embed(
        &self,
        dest: &ChannelRef,
        embed: Embed,
        nav: Option<NavButtons>,
    ) -> Result<MessageRef> {
        self.check_fail()?;
        Ok(self.record(dest.clone(), SentBody::Embed { embed, nav }))
    }

    async fn edit_embed(
        &self,
        target: &MessageRef,
        embed: Embed,
        nav: Option<NavButtons>,
    ) -> Result<()> {
        self.check_fail()?;
        let mut log = self.log.lock().unwrap();
        let idx = *log
            .index
            .get(target)
            .ok_or_else(|| CoreError::UnknownMessage(target.to_string()))?;
        let msg = &mut log.messages[idx];
        msg.body = SentBody::Embed { embed, nav };
        msg.edits += 1;
        Ok(())
    }

    async fn respond(&self, interaction: &Interaction, body: ResponseBody) -> Result<MessageRef> {
        self.check_fail()?;
        let body = match body {
            ResponseBody::Text(t) => SentBody::Text(t),
            ResponseBody::Embed { embed, nav } => SentBody::Embed { embed, nav },
        };
        Ok(self.record(interaction.channel(), body))
    }
}

/// Loopback [`DataStore`] over a guarded map of collections.
///
/// Like [`MemoryOutbound`], a one-shot failure can be armed to exercise the
/// query/upsert error paths.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<(DocumentId, Document)>>>,
    fail_next: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure: the next store call returns an error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_fail(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CoreError::Store("injected failure".into()));
        }
        Ok(())
    }

    /// Number of documents currently in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<(DocumentId, Document)>> {
        self.check_fail()?;
        let collections = self.collections.read().unwrap();
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<DocumentId> {
        self.check_fail()?;
        let id = DocumentId(Uuid::now_v7().to_string());
        let mut collections = self.collections.write().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), doc));
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &DocumentId, doc: Document) -> Result<()> {
        self.check_fail()?;
        let mut collections = self.collections.write().unwrap();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| CoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        match docs.iter_mut().find(|(existing, _)| existing == id) {
            Some((_, slot)) => {
                *slot = doc;
                Ok(())
            }
            None => Err(CoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn remove(&self, collection: &str, id: &DocumentId) -> Result<()> {
        self.check_fail()?;
        let mut collections = self.collections.write().unwrap();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| CoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let before = docs.len();
        docs.retain(|(existing, _)| existing != id);
        if docs.len() == before {
            return Err(CoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn outbound_records_and_edits() {
        let out = MemoryOutbound::new();
        let dest = ChannelRef::from("c1");
        let msg_ref = out.send_text(&dest, "hello").await.unwrap();
        assert_eq!(out.texts_to(&dest), vec!["hello".to_string()]);

        // editing a text message into an embed is allowed; the ref is stable
        out.edit_embed(&msg_ref, Embed::new().title("t"), None)
            .await
            .unwrap();
        let stored = out.message(&msg_ref).unwrap();
        assert_eq!(stored.edits, 1);
        assert!(stored.body.as_embed().is_some());
    }

    #[tokio::test]
    async fn outbound_rejects_unknown_ref() {
        let out = MemoryOutbound::new();
        let bogus = MessageRef {
            message_id: "nope".into(),
            channel: ChannelRef::from("c1"),
        };
        let err = out.edit_embed(&bogus, Embed::new(), None).await.unwrap_err();
        assert!(matches!(err, CoreError::UnknownMessage(_)));
    }

    #[tokio::test]
    async fn outbound_injected_failure_is_one_shot() {
        let out = MemoryOutbound::new();
        let dest = ChannelRef::from("c1");
        out.fail_next();
        assert!(out.send_text(&dest, "x").await.is_err());
        assert!(out.send_text(&dest, "y").await.is_ok());
    }

    #[tokio::test]
    async fn store_round_trip() {
        let store = MemoryStore::new();
        let id = store
            .insert("sites", json!({"url": "https://example.com", "user_id": "u1"}))
            .await
            .unwrap();
        let found = store
            .find("sites", &Filter::new().eq("user_id", "u1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, id);

        store
            .update("sites", &id, json!({"url": "https://example.org"}))
            .await
            .unwrap();
        store.remove("sites", &id).await.unwrap();
        assert!(store.is_empty("sites"));
        assert!(matches!(
            store.remove("sites", &id).await.unwrap_err(),
            CoreError::DocumentNotFound { .. }
        ));
    }
}
