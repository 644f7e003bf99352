//! Module dependency resolution
//!
//! Prerequisites come from a static map supplied by the boot configuration.
//! The map is read-only for the process lifetime.

use std::collections::HashMap;

use crate::module::traits::ModuleError;

/// Module name -> ordered prerequisite names
pub type DependencyMap = HashMap<String, Vec<String>>;

/// Dependency resolver over a static dependency map
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    dependencies: DependencyMap,
}

/// DFS colouring for cycle detection
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InResolution,
    Resolved,
}

impl DependencyResolver {
    pub fn new(dependencies: DependencyMap) -> Self {
        Self { dependencies }
    }

    /// Direct prerequisites of `module`, in map order; unknown modules have none
    pub fn resolve(&self, module: &str) -> &[String] {
        self.dependencies
            .get(module)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fail if any dependency chain reachable from `module` revisits a module
    /// that is still being resolved
    pub fn check_acyclic(&self, module: &str) -> Result<(), ModuleError> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut path: Vec<&str> = Vec::new();
        self.visit(module, &mut marks, &mut path)
    }

    fn visit<'a>(
        &'a self,
        module: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Result<(), ModuleError> {
        match marks.get(module) {
            Some(Mark::Resolved) => return Ok(()),
            Some(Mark::InResolution) => {
                let start = path.iter().position(|m| *m == module).unwrap_or(0);
                let mut cycle: Vec<&str> = path[start..].to_vec();
                cycle.push(module);
                return Err(ModuleError::DependencyCycleError(cycle.join(" -> ")));
            }
            None => {}
        }

        marks.insert(module, Mark::InResolution);
        path.push(module);
        for dep in self.resolve(module) {
            self.visit(dep, marks, path)?;
        }
        path.pop();
        marks.insert(module, Mark::Resolved);
        Ok(())
    }
}
