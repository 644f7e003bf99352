//! Shared helpers for module loading tests
#![allow(dead_code)]

use bootmod::module::loader::{ModuleImage, ModuleInserter, ModuleLoader};
use bootmod::module::registry::{DependencyMap, DependencyResolver, ModuleRegistry};
use bootmod::LoadOrchestrator;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Upper bound for any wait in a test; reaching it means a hang
pub const WAIT: Duration = Duration::from_secs(5);

/// One recorded insertion
#[derive(Debug, Clone)]
pub struct InsertCall {
    pub module: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Inserter that records calls instead of touching the kernel
#[derive(Debug, Default)]
pub struct FakeInserter {
    delay: Duration,
    failing: HashSet<String>,
    calls: Mutex<Vec<InsertCall>>,
}

impl FakeInserter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every insertion blocks for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Insertions of `modules` are rejected
    pub fn failing(mut self, modules: &[&str]) -> Self {
        self.failing = modules.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<InsertCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, module: &str) -> usize {
        self.calls().iter().filter(|c| c.module == module).count()
    }

    /// The recorded call for `module`; panics if it was never inserted
    pub fn call(&self, module: &str) -> InsertCall {
        self.calls()
            .into_iter()
            .find(|c| c.module == module)
            .unwrap_or_else(|| panic!("{} was never inserted", module))
    }
}

impl ModuleInserter for FakeInserter {
    fn insert_module(&self, image: &ModuleImage, _params: &str) -> Result<(), String> {
        let started = Instant::now();
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let finished = Instant::now();
        self.calls.lock().unwrap().push(InsertCall {
            module: image.name.clone(),
            started,
            finished,
        });
        if self.failing.contains(&image.name) {
            Err("Unknown symbol in module".to_string())
        } else {
            Ok(())
        }
    }
}

/// Temporary modules directory with fake images
pub struct LoaderFixture {
    pub temp_dir: TempDir,
    pub inserter: Arc<FakeInserter>,
}

impl LoaderFixture {
    /// Lay out `<name>.ko` for each of `modules`
    pub fn new(modules: &[&str], inserter: FakeInserter) -> Self {
        let temp_dir = TempDir::new().unwrap();
        for module in modules {
            write_image(temp_dir.path(), module);
        }
        Self {
            temp_dir,
            inserter: Arc::new(inserter),
        }
    }

    pub fn modules_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Fresh orchestrator over `dependencies` with an empty registry
    pub fn orchestrator(&self, dependencies: &[(&str, &[&str])]) -> LoadOrchestrator {
        self.orchestrator_with_registry(dependencies, ModuleRegistry::new())
    }

    pub fn orchestrator_with_registry(
        &self,
        dependencies: &[(&str, &[&str])],
        registry: ModuleRegistry,
    ) -> LoadOrchestrator {
        LoadOrchestrator::new(
            Arc::new(registry),
            Arc::new(DependencyResolver::new(dependency_map(dependencies))),
            Arc::new(ModuleLoader::new(self.modules_dir(), self.inserter.clone())),
        )
    }
}

pub fn write_image(dir: &Path, module: &str) {
    std::fs::write(dir.join(format!("{}.ko", module)), b"\x7fELF").unwrap();
}

pub fn dependency_map(entries: &[(&str, &[&str])]) -> DependencyMap {
    entries
        .iter()
        .map(|(module, deps)| {
            (
                module.to_string(),
                deps.iter().map(|d| d.to_string()).collect(),
            )
        })
        .collect()
}
