use thiserror::Error;

/// Errors of the runtime wiring: registries, bus and lifecycle.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A component with the same name tag is already registered.
    #[error("component already registered: {0}")]
    DuplicateComponent(String),

    /// No component is registered under the requested name.
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    /// The name resolved, but to a different concrete type than requested.
    #[error("component [{0}] is not of the requested type")]
    ComponentType(String),

    /// Publishing onto a bus whose consumer is gone.
    #[error("trigger bus closed")]
    BusClosed,

    /// A service's start hook failed. Fatal to process startup.
    #[error("service [{name}] failed to start: {reason}")]
    StartFailed { name: String, reason: String },

    /// A service's stop hook failed. Shutdown aborts at the first failure.
    #[error("service [{name}] failed to stop: {reason}")]
    StopFailed { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
