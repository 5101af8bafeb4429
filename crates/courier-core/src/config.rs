use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Default prefix opening an explicit text command (`$ping`).
pub const DEFAULT_PREFIX: &str = "$";
/// Default separator for user-supplied argument lists (tags etc).
pub const DEFAULT_SEPARATOR: &str = ";";
/// Trigger bus capacity before publishers start blocking.
pub const BUS_CAPACITY: usize = 100;

/// Top-level config (courier.toml + COURIER_* env overrides).
///
/// Constructed once at startup and passed as an immutable value into every
/// component that needs it: the parser, the matchers and the session
/// factories all take it explicitly, never through process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    #[serde(default)]
    pub messenger: MessengerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// How the bot recognises itself in inbound text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// Prefix opening an explicit command, e.g. `$` in `$save-site`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Separator splitting user argument lists, e.g. `;` in `a;b;c`.
    #[serde(default = "default_separator")]
    pub separator: String,
    /// The gateway-assigned identity used to detect `@bot` mentions.
    #[serde(default)]
    pub bot_id: String,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            separator: default_separator(),
            bot_id: String::new(),
        }
    }
}

/// Idle overtimes and pagination defaults for conversation sessions.
///
/// Overtimes are quiet periods: the timer re-arms on every processed event,
/// so a session dies after `overtime` of *inactivity*, not total lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_ask_overtime")]
    pub ask_overtime_secs: u64,
    #[serde(default = "default_save_overtime")]
    pub save_overtime_secs: u64,
    #[serde(default = "default_pager_overtime")]
    pub pager_overtime_secs: u64,
    /// Items per rendered page of a list session.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl SessionsConfig {
    pub fn ask_overtime(&self) -> Duration {
        Duration::from_secs(self.ask_overtime_secs)
    }

    pub fn save_overtime(&self) -> Duration {
        Duration::from_secs(self.save_overtime_secs)
    }

    pub fn pager_overtime(&self) -> Duration {
        Duration::from_secs(self.pager_overtime_secs)
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ask_overtime_secs: default_ask_overtime(),
            save_overtime_secs: default_save_overtime(),
            pager_overtime_secs: default_pager_overtime(),
            page_size: default_page_size(),
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}
fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}
fn default_ask_overtime() -> u64 {
    15
}
fn default_save_overtime() -> u64 {
    30
}
fn default_pager_overtime() -> u64 {
    300
}
fn default_page_size() -> usize {
    7
}

impl BotConfig {
    /// Load config from a TOML file with `COURIER_*` env var overrides.
    ///
    /// Nested keys use a double underscore in the environment, e.g.
    /// `COURIER_MESSENGER__PREFIX=!`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("COURIER_").split("__"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))
    }
}
