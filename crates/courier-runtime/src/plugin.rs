use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::bot::BotContext;
use crate::bus::{Trigger, TriggerKind};
use crate::error::{Result, RuntimeError};

/// Help texts a plugin declares at registration time.
///
/// This is a statically declared capability: the help feature reads these
/// through the registry instead of probing plugins for an interface at
/// runtime.
#[derive(Debug, Clone)]
pub struct PluginHelp {
    /// One-line summary of the whole plugin.
    pub summary: String,
    /// Per-command help entries.
    pub commands: Vec<CommandHelp>,
}

#[derive(Debug, Clone)]
pub struct CommandHelp {
    pub name: String,
    pub text: String,
}

/// A trigger consumer.
///
/// Every published trigger is handed to every registered plugin, each in its
/// own task; plugins observe triggers concurrently and in no defined
/// relative order, and must not assume anything about what other plugins
/// have done with the same trigger.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Unique name, used as the registry key.
    fn name(&self) -> &str;

    /// The trigger kinds this plugin reacts to, declared statically.
    fn accepted(&self) -> &[TriggerKind];

    /// Optional help capability, aggregated by the help feature.
    fn help(&self) -> Option<PluginHelp> {
        None
    }

    /// React to a trigger. Implementations start by checking
    /// [`accepts`](Plugin::accepts) and return early otherwise.
    async fn handle(&self, cx: Arc<BotContext>, trigger: Trigger);

    /// Whether `kind` is in the declared accepted set.
    fn accepts(&self, kind: TriggerKind) -> bool {
        self.accepted().contains(&kind)
    }
}

/// Name-keyed plugin directory, iteration in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
    names: HashSet<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();
        if !self.names.insert(name.clone()) {
            return Err(RuntimeError::DuplicateComponent(name));
        }
        debug!(plugin = %name, "plugin registered");
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// `(plugin name, help)` for every plugin that declares the capability.
    pub fn help_entries(&self) -> Vec<(&str, PluginHelp)> {
        self.plugins
            .iter()
            .filter_map(|p| p.help().map(|h| (p.name(), h)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
