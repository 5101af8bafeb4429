use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_core::{ChatMessage, Interaction};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, StageError};
use crate::key::CombinedKey;
use crate::session::StageRx;

/// An event delivered into a session's inbox.
#[derive(Debug, Clone)]
pub enum StageEvent {
    /// A follow-up chat message (continuation of the dialogue).
    Message(ChatMessage),
    /// A component press (e.g. pager navigation).
    Component(Interaction),
}

/// The store-resident side of a session: identity, progress and the two
/// control surfaces (inbox sender, cancellation token).
///
/// The receiving half lives inside the session task as a
/// [`StageRx`](crate::session::StageRx); the handle never sees it.
#[derive(Debug)]
pub struct StageHandle {
    key: CombinedKey,
    owner_id: String,
    channel_id: String,
    created_at: DateTime<Utc>,
    step: AtomicU32,
    tx: mpsc::Sender<StageEvent>,
    cancel: CancellationToken,
}

impl StageHandle {
    /// Build a handle plus the matching session-side receiver.
    ///
    /// The inbox is buffered at capacity 1: within one session events are
    /// processed strictly in arrival order, and a producer racing a slow
    /// step simply waits.
    pub fn channel(
        key: CombinedKey,
        owner_id: impl Into<String>,
        channel_id: impl Into<String>,
        overtime: Duration,
    ) -> (Self, StageRx) {
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = Self {
            key,
            owner_id: owner_id.into(),
            channel_id: channel_id.into(),
            created_at: Utc::now(),
            step: AtomicU32::new(0),
            tx,
            cancel: cancel.clone(),
        };
        (handle, StageRx::new(rx, cancel, overtime))
    }

    pub fn key(&self) -> &CombinedKey {
        &self.key
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Self-reported progress, surfaced in conflict errors.
    pub fn step(&self) -> u32 {
        self.step.load(Ordering::SeqCst)
    }

    /// Record progress. Called only by the owning session task.
    pub fn set_step(&self, step: u32) {
        self.step.store(step, Ordering::SeqCst);
    }

    /// Deliver an event into the session, in arrival order.
    ///
    /// Fails with [`StageError::Closed`] once the session has exited:
    /// post-dispose sends are rejected, never lost silently inside a dead
    /// queue.
    pub async fn forward(&self, event: StageEvent) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(StageError::Closed {
                key: self.key.clone(),
            });
        }
        self.tx
            .send(event)
            .await
            .map_err(|_| StageError::Closed {
                key: self.key.clone(),
            })
    }

    pub(crate) fn abort(&self) {
        self.cancel.cancel();
    }
}

/// Anything the store can hold: a concrete session type exposing its
/// [`StageHandle`]. The store is generic over this, so callers get their own
/// type back from lookups without downcasting.
pub trait Stage: Send + Sync + 'static {
    fn handle(&self) -> &StageHandle;
}

/// The single concurrency-safe table of active sessions.
///
/// All access goes through this API; the map is never touched directly.
pub struct StageStore<S> {
    stages: DashMap<CombinedKey, Arc<S>>,
}

impl<S: Stage> StageStore<S> {
    pub fn new() -> Self {
        Self {
            stages: DashMap::new(),
        }
    }

    /// Atomically check-and-insert a new session.
    ///
    /// The factory runs while the shard write lock is held, so there is no
    /// window between the existence check and the insert. On conflict the
    /// existing entry is left untouched and the error carries its
    /// self-reported step.
    pub fn try_create<F>(&self, key: CombinedKey, factory: F) -> Result<Arc<S>>
    where
        F: FnOnce() -> S,
    {
        match self.stages.entry(key) {
            Entry::Occupied(entry) => Err(StageError::Conflict {
                key: entry.key().clone(),
                step: entry.get().handle().step(),
            }),
            Entry::Vacant(entry) => {
                let stage = Arc::new(factory());
                debug!(key = %entry.key(), "stage created");
                entry.insert(Arc::clone(&stage));
                Ok(stage)
            }
        }
    }

    pub fn get(&self, key: &CombinedKey) -> Option<Arc<S>> {
        self.stages.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove the entry and signal the session to stop.
    ///
    /// Removal decides the race: of two concurrent disposers exactly one
    /// takes the entry out and fires the (idempotent) cancellation; the
    /// other observes `false`. The session task calls this on its own loop
    /// exit, which is then a no-op if a forced abort got there first.
    pub fn dispose(&self, key: &CombinedKey) -> bool {
        match self.stages.remove(key) {
            Some((key, stage)) => {
                stage.handle().abort();
                debug!(key = %key, "stage disposed");
                true
            }
            None => false,
        }
    }

    /// Visit every active session. The visitor returns `true` to stop early.
    ///
    /// No lock is held while the visitor runs: iteration snapshots the keys
    /// and re-fetches each entry, so the visitor may insert or dispose
    /// stages freely. Entries created or removed mid-scan may be skipped or
    /// seen once; never visited twice, never deadlocked on.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&CombinedKey, &Arc<S>) -> bool,
    {
        let keys: Vec<CombinedKey> = self.stages.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some(stage) = self.get(&key) {
                if visitor(&key, &stage) {
                    return;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl<S: Stage> Default for StageStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestStage {
        handle: StageHandle,
    }

    impl Stage for TestStage {
        fn handle(&self) -> &StageHandle {
            &self.handle
        }
    }

    fn make_stage(key: &CombinedKey) -> (TestStage, StageRx) {
        let (handle, rx) =
            StageHandle::channel(key.clone(), "u1", "c1", Duration::from_millis(200));
        (TestStage { handle }, rx)
    }

    #[tokio::test]
    async fn second_create_fails_and_preserves_existing() {
        let store = StageStore::new();
        let key = CombinedKey::join(["c1", "u1"]);
        let (stage, _rx) = make_stage(&key);
        let created = store.try_create(key.clone(), || stage).unwrap();
        created.handle().set_step(2);

        let (other, _rx2) = make_stage(&key);
        let err = store.try_create(key.clone(), || other).unwrap_err();
        match err {
            StageError::Conflict { step, .. } => assert_eq!(step, 2),
            other => panic!("expected conflict, got {other:?}"),
        }
        // the original entry is untouched
        assert_eq!(store.get(&key).unwrap().handle().step(), 2);
    }

    #[tokio::test]
    async fn concurrent_dispose_wins_exactly_once() {
        let store = Arc::new(StageStore::new());
        let key = CombinedKey::join(["c1", "u1"]);
        let (stage, _rx) = make_stage(&key);
        store.try_create(key.clone(), || stage).unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let key = key.clone();
            tasks.push(tokio::spawn(async move { store.dispose(&key) }));
        }
        let mut wins = 0;
        for task in tasks {
            if task.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn forward_after_dispose_is_rejected() {
        let store = StageStore::new();
        let key = CombinedKey::join(["c1", "u1"]);
        let (stage, _rx) = make_stage(&key);
        let created = store.try_create(key.clone(), || stage).unwrap();
        store.dispose(&key);

        let msg = ChatMessage {
            message_id: "m1".into(),
            channel_id: "c1".into(),
            guild_id: None,
            author_id: "u1".into(),
            author_is_bot: false,
            content: "late".into(),
            timestamp: Utc::now(),
        };
        let err = created
            .handle()
            .forward(StageEvent::Message(msg))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Closed { .. }));
    }

    #[tokio::test]
    async fn for_each_tolerates_disposal_by_visitor() {
        let store = StageStore::new();
        let mut rxs = Vec::new();
        for i in 0..4 {
            let key = CombinedKey::join(["c1", &format!("u{i}")]);
            let (stage, rx) = make_stage(&key);
            store.try_create(key, || stage).unwrap();
            rxs.push(rx);
        }

        let mut seen = 0;
        store.for_each(|key, _stage| {
            seen += 1;
            store.dispose(key);
            false
        });
        assert_eq!(seen, 4);
        assert!(store.is_empty());
    }
}
