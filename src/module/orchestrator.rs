//! Load orchestration
//!
//! Ties the registry, dependency resolver and loader together. Every module
//! whose attempt a request comes to own gets its own task: wait for the
//! prerequisite attempts, insert the image, complete the attempt. Modules with
//! disjoint dependencies therefore load in parallel.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::module::loader::ModuleLoader;
use crate::module::registry::{CompletionHandle, DependencyResolver, LoadTicket, ModuleRegistry};
use crate::module::traits::{LoadOutcome, ModuleError};
use crate::utils::timeout::with_custom_timeout;

/// Entry point for loading modules by name
#[derive(Debug, Clone)]
pub struct LoadOrchestrator {
    registry: Arc<ModuleRegistry>,
    resolver: Arc<DependencyResolver>,
    loader: Arc<ModuleLoader>,
}

impl LoadOrchestrator {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        resolver: Arc<DependencyResolver>,
        loader: Arc<ModuleLoader>,
    ) -> Self {
        Self {
            registry,
            resolver,
            loader,
        }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<DependencyResolver> {
        &self.resolver
    }

    /// Start loading `names` and their prerequisites without waiting
    ///
    /// The returned handle resolves once every requested module has finished.
    /// A module's outcome covers its whole prerequisite closure, whether this
    /// call started the attempt or attached to a running one. Must be called
    /// within a tokio runtime.
    pub fn request_modules<I, S>(&self, names: I) -> CompletionHandle
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let handles: Vec<CompletionHandle> = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                match self.resolver.check_acyclic(name) {
                    Ok(()) => self.request_one(name),
                    Err(e) => {
                        warn!("Refusing to load {}: {}", name, e);
                        CompletionHandle::failed(e)
                    }
                }
            })
            .collect();
        CompletionHandle::all(handles)
    }

    /// Load `names` and wait for the outcome
    pub async fn request_modules_and_wait<I, S>(&self, names: I) -> LoadOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.request_modules(names).wait().await
    }

    /// Like [`request_modules_and_wait`](Self::request_modules_and_wait) with a deadline
    ///
    /// Attempts keep running after the deadline; only the wait is abandoned.
    pub async fn request_modules_with_timeout<I, S>(&self, names: I, timeout: Duration) -> LoadOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let handle = self.request_modules(names);
        match with_custom_timeout(handle.wait(), timeout).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ModuleError::Timeout(timeout)),
        }
    }

    fn request_one(&self, module: &str) -> CompletionHandle {
        match self.registry.request_load(module) {
            LoadTicket::Owner(handle) => {
                let prerequisites = CompletionHandle::all(
                    self.resolver
                        .resolve(module)
                        .iter()
                        .map(|dep| self.request_one(dep)),
                );

                tokio::spawn(load_task(
                    module.to_string(),
                    prerequisites,
                    Arc::clone(&self.registry),
                    Arc::clone(&self.loader),
                ));
                handle
            }
            ticket => ticket.into_handle(),
        }
    }
}

/// One owned attempt: prerequisites, then insertion, then completion
///
/// Insertion is attempted even when a prerequisite failed; the kernel rejects
/// the image if it really needs the missing symbols. Waiters still see the
/// prerequisite failure.
async fn load_task(
    module: String,
    prerequisites: CompletionHandle,
    registry: Arc<ModuleRegistry>,
    loader: Arc<ModuleLoader>,
) {
    let deps_outcome = prerequisites.wait().await;
    if let Err(e) = &deps_outcome {
        warn!("Loading {} although a prerequisite failed: {}", module, e);
    }

    let name = module.clone();
    let outcome = tokio::task::spawn_blocking(move || loader.load_file(&name))
        .await
        .unwrap_or_else(|e| Err(ModuleError::load(&module, format!("Task join error: {e}"))));

    match &outcome {
        Ok(()) => debug!("Completing load of {}", module),
        Err(e) => warn!("{}", e),
    }
    registry.complete_load_after(&module, outcome, deps_outcome);
}
