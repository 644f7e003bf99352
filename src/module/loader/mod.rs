//! Module loading
//!
//! Locates module images by name and inserts them into the kernel.

pub mod loader;

pub use loader::{
    parse_proc_modules, read_loaded_modules, KernelInserter, ModuleImage, ModuleInserter,
    ModuleLoader, DEFAULT_MODULES_DIR, PROC_MODULES,
};
