//! Bootmod - early-boot kernel module loader
//!
//! This crate is the device-enablement layer of a minimal init that runs from
//! the initramfs. It loads kernel modules, on explicit request or for
//! hardware discovery events, in dependency order and in parallel where the
//! dependency graph allows.
//!
//! ## Design Principles
//!
//! 1. **At most once**: a module is inserted at most once per load attempt,
//!    however many callers ask for it
//! 2. **Dependencies first**: a module's insertion starts only after its
//!    prerequisites' attempts have finished
//! 3. **No hang on failure**: every waiter is released, success or not
//! 4. **No globals**: the registry is an owned value passed to the orchestrator

pub mod config;
pub mod module;
pub mod utils;

pub use config::{InitConfig, LoggingConfig};
pub use module::{
    AliasTable, CompletionHandle, DependencyResolver, KernelInserter, LoadOrchestrator,
    ModaliasDispatcher, ModuleError, ModuleInserter, ModuleLoader, ModuleRegistry,
};

use std::sync::Arc;

/// Build an orchestrator for `config` that inserts through `inserter`
///
/// The registry starts with `already_loaded` marked as loaded.
pub fn orchestrator_from_config<I, S>(
    config: &InitConfig,
    inserter: Arc<dyn ModuleInserter>,
    already_loaded: I,
) -> LoadOrchestrator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    LoadOrchestrator::new(
        Arc::new(ModuleRegistry::with_loaded(already_loaded)),
        Arc::new(DependencyResolver::new(config.module_dependencies.clone())),
        Arc::new(ModuleLoader::new(config.modules_dir(), inserter)),
    )
}
