//! Module system types and errors
//!
//! Defines the load state tracked per module and the error taxonomy shared by
//! alias matching, dependency resolution and module insertion.

use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// Outcome of a single load attempt, delivered to every waiter.
pub type LoadOutcome = Result<(), ModuleError>;

/// Per-module load state held by the registry
#[derive(Debug, Default)]
pub enum ModuleState {
    /// Not loaded, no attempt in flight (also the state after a failed attempt)
    #[default]
    Unloaded,
    /// An attempt is in flight; every waiter is released when it completes
    Loading(Vec<oneshot::Sender<LoadOutcome>>),
    /// Inserted into the kernel
    Loaded,
}

impl ModuleState {
    /// Whether the module is already in the kernel
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModuleState::Loaded)
    }

    /// Whether a load attempt is currently in flight
    pub fn is_loading(&self) -> bool {
        matches!(self, ModuleState::Loading(_))
    }
}

/// Module system errors
///
/// `Clone` so that one attempt's failure can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed alias pattern {pattern:?}: {reason}")]
    PatternError { pattern: String, reason: String },

    #[error("Failed to load module {module}: {cause}")]
    LoadError { module: String, cause: String },

    #[error("Module dependency cycle: {0}")]
    DependencyCycleError(String),

    #[error("No module matches alias {0}")]
    NoAliasMatch(String),

    #[error("Timeout after {0:?} waiting for modules")]
    Timeout(Duration),
}

impl ModuleError {
    /// Build a load error for `module`
    pub fn load(module: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        ModuleError::LoadError {
            module: module.into(),
            cause: cause.to_string(),
        }
    }

    /// Name of the module this error is scoped to, if any
    pub fn module(&self) -> Option<&str> {
        match self {
            ModuleError::LoadError { module, .. } => Some(module),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ModuleError {
    fn from(e: toml::de::Error) -> Self {
        ModuleError::ConfigError(e.to_string())
    }
}
