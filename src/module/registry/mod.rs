//! Module registry and dependency resolution
//!
//! The registry is the only mutable shared state of the loader. It tracks the
//! load state of every module that has been requested and guarantees at most
//! one in-flight load attempt per module name.

pub mod dependencies;
pub mod handle;

pub use dependencies::{DependencyMap, DependencyResolver};
pub use handle::CompletionHandle;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::module::traits::{LoadOutcome, ModuleState};

/// Result of asking the registry to load a module
#[derive(Debug)]
pub enum LoadTicket {
    /// Module is already loaded, nothing to do
    Loaded,
    /// Caller started the attempt and must resolve dependencies, load, then
    /// call [`ModuleRegistry::complete_load`]
    Owner(CompletionHandle),
    /// Another caller owns the attempt; the handle is released when it completes
    Attached(CompletionHandle),
}

impl LoadTicket {
    /// Handle for the attempt this ticket refers to
    pub fn into_handle(self) -> CompletionHandle {
        match self {
            LoadTicket::Loaded => CompletionHandle::success(),
            LoadTicket::Owner(handle) | LoadTicket::Attached(handle) => handle,
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, LoadTicket::Owner(_))
    }
}

/// Load state machine for all modules
///
/// Every transition happens under one lock that is held only for bookkeeping.
/// Instances are independent; an orchestrator owns one through an `Arc`.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: Mutex<HashMap<String, ModuleState>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where `names` are already loaded (e.g. read from `/proc/modules`)
    pub fn with_loaded<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let modules = names
            .into_iter()
            .map(|name| (name.into(), ModuleState::Loaded))
            .collect();
        Self {
            modules: Mutex::new(modules),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ModuleState>> {
        // A panic while holding the lock cannot leave a half-applied transition
        self.modules.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Request a load of `module`
    ///
    /// `Unloaded -> Loading` hands ownership of the attempt to the caller; a
    /// request while `Loading` attaches a new waiter to the running attempt.
    pub fn request_load(&self, module: &str) -> LoadTicket {
        let (tx, rx) = oneshot::channel();
        let mut modules = self.lock();
        let state = modules.entry(module.to_string()).or_default();
        match state {
            ModuleState::Loaded => LoadTicket::Loaded,
            ModuleState::Loading(waiters) => {
                waiters.push(tx);
                debug!("Module {} already loading, {} waiters", module, waiters.len());
                LoadTicket::Attached(CompletionHandle::pending(module, rx))
            }
            ModuleState::Unloaded => {
                *state = ModuleState::Loading(vec![tx]);
                LoadTicket::Owner(CompletionHandle::pending(module, rx))
            }
        }
    }

    /// Finish the in-flight attempt for `module`
    ///
    /// Every attached waiter is released with `outcome`. Success moves the
    /// module to `Loaded`, failure back to `Unloaded` so a later request retries.
    pub fn complete_load(&self, module: &str, outcome: LoadOutcome) {
        self.finish_load(module, outcome.is_ok(), outcome);
    }

    /// Finish the in-flight attempt for `module` after its prerequisites
    ///
    /// The state follows `inserted` alone. Waiters are released with the
    /// insertion error if there is one, otherwise with the prerequisites'
    /// outcome, so every waiter sees the same failure as the requester that
    /// started the attempt.
    pub fn complete_load_after(
        &self,
        module: &str,
        inserted: LoadOutcome,
        prerequisites: LoadOutcome,
    ) {
        let loaded = inserted.is_ok();
        self.finish_load(module, loaded, inserted.and(prerequisites));
    }

    fn finish_load(&self, module: &str, loaded: bool, outcome: LoadOutcome) {
        let next = if loaded {
            ModuleState::Loaded
        } else {
            ModuleState::Unloaded
        };

        let previous = {
            let mut modules = self.lock();
            modules.insert(module.to_string(), next)
        };

        match previous {
            Some(ModuleState::Loading(waiters)) => {
                for waiter in waiters {
                    // Receiver may have been dropped by a caller that stopped waiting
                    let _ = waiter.send(outcome.clone());
                }
            }
            other => {
                warn!(
                    "Completed load of {} that was not in flight (state: {:?})",
                    module, other
                );
            }
        }
    }

    /// Whether `module` is loaded
    pub fn is_loaded(&self, module: &str) -> bool {
        self.lock().get(module).map(ModuleState::is_loaded).unwrap_or(false)
    }

    /// Names of all loaded modules, sorted
    pub fn loaded_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, state)| state.is_loaded())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of attempts currently in flight
    pub fn in_flight(&self) -> usize {
        self.lock().values().filter(|state| state.is_loading()).count()
    }
}
