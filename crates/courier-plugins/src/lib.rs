//! courier-plugins: the features shipped with the Courier runtime.
//!
//! Each plugin receives its collaborator capabilities
//! ([`Outbound`](courier_core::Outbound), [`DataStore`](courier_core::DataStore))
//! and the immutable [`BotConfig`](courier_core::BotConfig) at construction;
//! nothing is resolved through global state afterwards.
//!
//! - [`PingPlugin`]: liveness check over text and interaction surfaces.
//! - [`HelpPlugin`]: aggregates the help capability every plugin declares.
//! - [`AskPlugin`]: the demo stepped-dialogue session.
//! - [`ArchivePlugin`]: the save-resource feature; explicit command,
//!   named interactions, implicit URL sessions and the paginated list view.

pub mod archive;
pub mod ask;
pub mod help;
pub mod ping;

pub use archive::ArchivePlugin;
pub use ask::AskPlugin;
pub use help::HelpPlugin;
pub use ping::PingPlugin;
