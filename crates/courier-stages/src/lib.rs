//! courier-stages: the keyed session engine.
//!
//! A *stage* is one live conversation: a keyed entry in the [`StageStore`],
//! one spawned task, one buffered inbox and one idle timer. The store
//! guarantees at-most-one stage per [`CombinedKey`] and exactly-once
//! disposal; the [`session`] primitives give every stage loop the same
//! select shape (inbox / re-armed idle timer / cancellation).
//!
//! [`Pager`] is the reusable list-session payload: a page-at-a-time view
//! over an eagerly loaded result set with two-button wrap-around navigation.

pub mod error;
pub mod key;
pub mod pager;
pub mod session;
pub mod store;

pub use error::{Result, StageError};
pub use key::CombinedKey;
pub use pager::{Pager, PagerAction, PagerItem, PagerLoader, PagerTarget};
pub use session::{StageRx, StageSignal};
pub use store::{Stage, StageEvent, StageHandle, StageStore};
