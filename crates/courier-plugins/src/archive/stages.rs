//! The two session kinds of the archive feature: the stepped save dialogue
//! and the pager-backed list view.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_command::{calling_bot, separate_args};
use courier_core::{BotConfig, ChannelRef, DataStore, DocumentId, Filter, Outbound};
use courier_stages::{
    CombinedKey, Pager, PagerAction, PagerItem, PagerLoader, Stage, StageEvent, StageHandle,
    StageRx, StageSignal, StageStore,
};
use tracing::{debug, warn};

use super::record::{SiteRecord, SITE_COLLECTION};

/// Component ids of the list pager's navigation buttons.
pub const LIST_BUTTON_PREV: &str = "ls-site-prev";
pub const LIST_BUTTON_NEXT: &str = "ls-site-next";

// ---------------------------------------------------------------------------
// save session
// ---------------------------------------------------------------------------

/// Store entry for a running save dialogue. The partial record lives with
/// the session task; only identity and progress are visible from outside.
pub struct SaveStage {
    pub(super) handle: StageHandle,
}

impl Stage for SaveStage {
    fn handle(&self) -> &StageHandle {
        &self.handle
    }
}

/// Everything the spawned save-session task needs, cloned out of the plugin.
pub(super) struct SaveSession {
    pub config: Arc<BotConfig>,
    pub outbound: Arc<dyn Outbound>,
    pub store: Arc<dyn DataStore>,
    pub stages: Arc<StageStore<SaveStage>>,
    pub stage: Arc<SaveStage>,
    pub key: CombinedKey,
    pub channel: ChannelRef,
    pub record: SiteRecord,
}

impl SaveSession {
    async fn say(&self, text: &str) {
        if let Err(e) = self.outbound.send_text(&self.channel, text).await {
            warn!(error = %e, "save session: outbound send failed");
        }
    }

    /// The step loop. Advances on well-formed `@bot` answers, re-prompts on
    /// malformed ones, survives collaborator failures, and disposes its own
    /// store entry on every exit path.
    pub async fn run(mut self, mut inbox: StageRx) {
        let overtime_secs = inbox.overtime().as_secs();
        self.say(&format!(
            "Detected the following url:\n> {}\nSave it to the archive? (y/yes/n/no)\n\
             All answers must start with the @bot mention; the session expires after \
             {overtime_secs}s of silence.",
            self.record.url
        ))
        .await;

        loop {
            match inbox.next().await {
                StageSignal::Event(StageEvent::Message(message)) => {
                    let Some(content) = calling_bot(&message.content, &self.config.messenger)
                    else {
                        continue;
                    };
                    if self.step(&content).await {
                        break;
                    }
                }
                StageSignal::Event(StageEvent::Component(_)) => continue,
                StageSignal::Timeout => {
                    self.say("Time's up.").await;
                    break;
                }
                StageSignal::Cancelled => {
                    debug!(key = %self.key, "save session force-aborted");
                    break;
                }
            }
        }
        self.stages.dispose(&self.key);
    }

    /// Process one answer. Returns true when the session is finished.
    async fn step(&mut self, content: &str) -> bool {
        let handle = &self.stage.handle;
        match handle.step() {
            0 => match content {
                "y" | "yes" => {
                    self.say(&format!(
                        "[1/2] Add tags for this site, separated by [{}]; type \"-\" to leave \
                         them blank.",
                        self.config.messenger.separator
                    ))
                    .await;
                    handle.set_step(1);
                    false
                }
                "n" | "no" => {
                    self.say("Site saving cancelled.").await;
                    true
                }
                _ => {
                    self.say("Please answer y/yes or n/no.").await;
                    false
                }
            },
            1 => {
                let args = separate_args(content, &self.config.messenger.separator);
                if args.is_empty() {
                    self.say("Add at least one tag, or use \"-\" to leave the field blank.")
                        .await;
                    return false;
                }
                if args != ["-"] {
                    self.record.tags = args;
                }
                self.say("[2/2] Add a note for this site; type \"-\" to leave it blank.")
                    .await;
                handle.set_step(2);
                false
            }
            _ => {
                if content != "-" {
                    self.record.note = content.to_string();
                }
                self.record.touch();
                let doc = match self.record.to_document() {
                    Ok(doc) => doc,
                    Err(e) => {
                        warn!(error = %e, "save session: record serialization failed");
                        self.say("Something went wrong while saving. Please try again.")
                            .await;
                        return false;
                    }
                };
                match self.store.insert(SITE_COLLECTION, doc).await {
                    Ok(_) => {
                        self.say(&format!("Site saved:\n{}", self.record.essential_info()))
                            .await;
                        true
                    }
                    Err(e) => {
                        // the step does not advance; the user may answer again
                        warn!(error = %e, "save session: insert failed");
                        self.say("Something went wrong while saving. Please try again.")
                            .await;
                        false
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// list session
// ---------------------------------------------------------------------------

/// Store entry for a live list view: the stage plumbing plus an immutable
/// snapshot of the loaded records, addressable by relative id.
pub struct ListStage {
    pub(super) handle: StageHandle,
    pub(super) items: Vec<(DocumentId, SiteRecord)>,
}

impl ListStage {
    /// The record at the given 1-based relative id from the last query.
    pub fn relative(&self, id: usize) -> Option<&(DocumentId, SiteRecord)> {
        if id == 0 {
            return None;
        }
        self.items.get(id - 1)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl Stage for ListStage {
    fn handle(&self) -> &StageHandle {
        &self.handle
    }
}

/// Runs the archive query exactly once and keeps a typed copy of the result
/// set for relative-id addressing.
pub(super) struct ArchiveLoader {
    store: Arc<dyn DataStore>,
    filter: Filter,
    loaded: Mutex<Vec<(DocumentId, SiteRecord)>>,
}

impl ArchiveLoader {
    pub fn new(store: Arc<dyn DataStore>, filter: Filter) -> Self {
        Self {
            store,
            filter,
            loaded: Mutex::new(Vec::new()),
        }
    }

    /// The records materialized by `load_all`, in query order.
    pub fn snapshot(&self) -> Vec<(DocumentId, SiteRecord)> {
        self.loaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl PagerLoader for ArchiveLoader {
    async fn load_all(&self) -> courier_core::Result<Vec<Box<dyn PagerItem>>> {
        let docs = self.store.find(SITE_COLLECTION, &self.filter).await?;
        let mut records = Vec::with_capacity(docs.len());
        let mut items: Vec<Box<dyn PagerItem>> = Vec::with_capacity(docs.len());
        for (id, doc) in docs {
            match SiteRecord::from_document(doc) {
                Ok(record) => {
                    items.push(Box::new(record.clone()));
                    records.push((id, record));
                }
                Err(e) => warn!(id = %id, error = %e, "skipping malformed archive document"),
            }
        }
        *self.loaded.lock().unwrap() = records;
        Ok(items)
    }
}

/// The list-session loop: forwards navigation presses from the session inbox
/// into the pager, ignores everyone but the owner, and locks the buttons on
/// the way out before removing its own store entry.
pub(super) struct ListSession {
    pub stages: Arc<StageStore<ListStage>>,
    pub key: CombinedKey,
    pub pager: Pager,
}

impl ListSession {
    pub async fn run(mut self, mut inbox: StageRx) {
        loop {
            match inbox.next().await {
                StageSignal::Event(StageEvent::Component(interaction)) => {
                    if interaction.user_id != self.pager.owner_id() {
                        continue;
                    }
                    let courier_core::InteractionData::Component { custom_id, .. } =
                        &interaction.data
                    else {
                        continue;
                    };
                    let action = match custom_id.as_str() {
                        LIST_BUTTON_PREV => PagerAction::PrevPage,
                        LIST_BUTTON_NEXT => PagerAction::NextPage,
                        other => {
                            warn!(custom_id = other, "unknown component id on list pager");
                            continue;
                        }
                    };
                    if let Err(e) = self.pager.switch_page(action).await {
                        warn!(error = %e, "pager page turn failed");
                    }
                }
                StageSignal::Event(StageEvent::Message(_)) => continue,
                StageSignal::Timeout => {
                    debug!(key = %self.key, "list session expired");
                    break;
                }
                StageSignal::Cancelled => {
                    debug!(key = %self.key, "list session force-aborted");
                    break;
                }
            }
        }
        if let Err(e) = self.pager.lock_buttons().await {
            warn!(error = %e, "failed to lock pager buttons");
        }
        self.stages.dispose(&self.key);
    }
}
