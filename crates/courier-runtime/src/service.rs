use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::{Result, RuntimeError};

/// Runtime state of a service, queryable without blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Created,
    Running,
    Stopped,
}

/// A long-lived external-facing component: a chat gateway, a database
/// client, a webhook receiver.
///
/// Services that produce triggers take a
/// [`TriggerPublisher`](crate::bus::TriggerPublisher) in their constructor:
/// the capability is wired explicitly at build time, never discovered
/// through an interface probe.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Stable identifier, used as the registry key. Must be unique.
    fn name(&self) -> &str;

    /// Bring the service online. Called once, concurrently with the other
    /// services' starts.
    async fn start(&self) -> courier_core::Result<()>;

    /// Take the service offline. Called in reverse registration order.
    async fn stop(&self) -> courier_core::Result<()>;

    fn status(&self) -> ServiceStatus;
}

struct RegisteredService {
    name: String,
    service: Arc<dyn Service>,
    /// The same object, kept as `Any` so `fetch` can hand back the concrete
    /// type without the caller downcasting.
    concrete: Arc<dyn Any + Send + Sync>,
}

/// Name-keyed service directory with ordered startup and reverse-order
/// shutdown. Registration order is preserved and is the startup order.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: Vec<RegisteredService>,
    index: HashMap<String, usize>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its name tag.
    pub fn register<S: Service>(&mut self, service: Arc<S>) -> Result<()> {
        let name = service.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RuntimeError::DuplicateComponent(name));
        }
        info!(service = %name, "service registered");
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(RegisteredService {
            name,
            concrete: Arc::clone(&service) as Arc<dyn Any + Send + Sync>,
            service,
        });
        Ok(())
    }

    /// Typed lookup of a previously registered service.
    ///
    /// This is how components acquire references to the services they depend
    /// on: explicit, resolved once at wiring time, never through global
    /// state.
    pub fn fetch<S: Service>(&self, name: &str) -> Result<Arc<S>> {
        let entry = self
            .index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RuntimeError::UnknownComponent(name.to_string()))?;
        Arc::clone(&entry.concrete)
            .downcast::<S>()
            .map_err(|_| RuntimeError::ComponentType(name.to_string()))
    }

    /// Start every registered service concurrently and wait for all of them.
    ///
    /// A failing start aborts startup with the offending service named. A
    /// panicking start is not recovered; it is fatal to the process.
    pub async fn start_all(&self) -> Result<()> {
        info!(count = self.entries.len(), "starting services");
        let tasks: Vec<_> = self
            .entries
            .iter()
            .map(|entry| {
                let name = entry.name.clone();
                let service = Arc::clone(&entry.service);
                tokio::spawn(async move {
                    service.start().await.map_err(|e| RuntimeError::StartFailed {
                        name,
                        reason: e.to_string(),
                    })
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("service start panicked")?;
        }
        info!("all services online");
        Ok(())
    }

    /// Stop services serially in strict reverse registration order.
    ///
    /// Later services may depend on earlier ones staying alive during their
    /// own shutdown, hence no concurrency here. The first failure is logged
    /// with the offending component and aborts the remainder.
    pub async fn stop_all(&self) -> Result<()> {
        for entry in self.entries.iter().rev() {
            if let Err(e) = entry.service.stop().await {
                error!(service = %entry.name, error = %e, "service failed to stop");
                return Err(RuntimeError::StopFailed {
                    name: entry.name.clone(),
                    reason: e.to_string(),
                });
            }
            info!(service = %entry.name, "service stopped");
        }
        Ok(())
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
