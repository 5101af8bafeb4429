use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::store::StageEvent;

/// What the session loop should do next.
#[derive(Debug)]
pub enum StageSignal {
    /// An inbound event arrived; process it and keep looping.
    Event(StageEvent),
    /// The quiet period elapsed with no input: notify the user and exit.
    Timeout,
    /// Forced abort; exit immediately without sending further output.
    Cancelled,
}

/// The session-side receiver: every stage loop awaits
/// [`next`](StageRx::next) and matches on the signal.
///
/// The idle timer is re-armed on every call, so a session dies after
/// `overtime` of *inactivity*, not after a fixed total lifetime.
pub struct StageRx {
    rx: mpsc::Receiver<StageEvent>,
    cancel: CancellationToken,
    overtime: Duration,
}

impl StageRx {
    pub(crate) fn new(
        rx: mpsc::Receiver<StageEvent>,
        cancel: CancellationToken,
        overtime: Duration,
    ) -> Self {
        Self {
            rx,
            cancel,
            overtime,
        }
    }

    pub fn overtime(&self) -> Duration {
        self.overtime
    }

    /// Await the next signal.
    ///
    /// Cancellation is polled first so a forced abort always beats an event
    /// that happens to be sitting in the inbox.
    pub async fn next(&mut self) -> StageSignal {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => StageSignal::Cancelled,
            event = self.rx.recv() => match event {
                Some(event) => StageSignal::Event(event),
                // all senders gone; treat like an abort
                None => StageSignal::Cancelled,
            },
            _ = tokio::time::sleep(self.overtime) => StageSignal::Timeout,
        }
    }
}
