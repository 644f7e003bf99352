//! Kernel module loading subsystem
//!
//! Loads driver modules before the real root filesystem is mounted, either by
//! name (mandatory modules from the boot config) or in response to hardware
//! discovery events.
//!
//! ## Architecture
//!
//! - **Alias matching**: a modalias string maps to candidate modules through
//!   the build-time alias table
//! - **Registry**: one state machine per module name guarantees at most one
//!   in-flight load attempt, and every waiter sees that attempt's outcome
//! - **Dependency ordering**: a module is inserted only after every
//!   prerequisite attempt has finished
//! - **Parallelism**: independent modules are inserted concurrently

pub mod alias;
pub mod events;
pub mod loader;
pub mod orchestrator;
pub mod registry;
pub mod traits;

pub use alias::{AliasEntry, AliasTable};
pub use events::ModaliasDispatcher;
pub use loader::{KernelInserter, ModuleImage, ModuleInserter, ModuleLoader};
pub use orchestrator::LoadOrchestrator;
pub use registry::{CompletionHandle, DependencyMap, DependencyResolver, LoadTicket, ModuleRegistry};
pub use traits::{LoadOutcome, ModuleError, ModuleState};
