use thiserror::Error;

use crate::key::CombinedKey;

/// Errors of the session engine.
#[derive(Debug, Error)]
pub enum StageError {
    /// `try_create` found an existing entry under the key. Carries the
    /// existing session's self-reported progress so callers can surface
    /// "already active at step N".
    #[error("a session is already active at step {step} ({key})")]
    Conflict { key: CombinedKey, step: u32 },

    /// Delivery into a session whose inbox is already gone; the session
    /// disposed itself (or was force-aborted) before the event arrived.
    #[error("session is no longer accepting input ({key})")]
    Closed { key: CombinedKey },
}

pub type Result<T> = std::result::Result<T, StageError>;
