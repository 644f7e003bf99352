//! Hardware discovery events
//!
//! Each discovered device reports a modalias string. Matching modules are
//! loaded opportunistically: failures are logged, never surfaced to the
//! event source.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::module::alias::AliasTable;
use crate::module::orchestrator::LoadOrchestrator;
use crate::module::traits::ModuleError;
use crate::utils::error::log_error_async;

/// Turns modalias strings into module load requests
#[derive(Debug, Clone)]
pub struct ModaliasDispatcher {
    aliases: Arc<AliasTable>,
    orchestrator: LoadOrchestrator,
}

impl ModaliasDispatcher {
    pub fn new(aliases: Arc<AliasTable>, orchestrator: LoadOrchestrator) -> Self {
        Self {
            aliases,
            orchestrator,
        }
    }

    /// Request the modules matching `alias`
    ///
    /// Returns the task reporting the load outcome, or `None` when nothing was
    /// requested. A malformed alias pattern is logged and treated as no-op;
    /// an alias that matches nothing is `NoAliasMatch`.
    pub fn load_modalias(&self, alias: &str) -> Result<Option<JoinHandle<()>>, ModuleError> {
        let modules = match self.aliases.match_alias(alias) {
            Ok(modules) => modules,
            Err(e) => {
                debug!("unable to match modalias {}: {}", alias, e);
                return Ok(None);
            }
        };
        if modules.is_empty() {
            return Err(ModuleError::NoAliasMatch(alias.to_string()));
        }

        let handle = self.orchestrator.request_modules(&modules);
        let context = format!("Loading modules {:?} for modalias {}", modules, alias);
        Ok(Some(tokio::spawn(async move {
            log_error_async(|| handle.wait(), &context).await;
        })))
    }

    /// Dispatch every modalias received on `events` until the channel closes
    ///
    /// Waits for all requested loads before returning.
    pub async fn run(&self, mut events: mpsc::Receiver<String>) {
        let mut pending = Vec::new();
        let mut received = 0usize;

        while let Some(alias) = events.recv().await {
            received += 1;
            match self.load_modalias(&alias) {
                Ok(Some(task)) => pending.push(task),
                Ok(None) => {}
                Err(e) => debug!("{}", e),
            }
        }

        for task in futures::future::join_all(pending).await {
            if let Err(e) = task {
                warn!("Modalias load task failed: {}", e);
            }
        }
        info!("Processed {} modalias events", received);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::loader::{ModuleImage, ModuleInserter, ModuleLoader};
    use crate::module::registry::{DependencyResolver, ModuleRegistry};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingInserter {
        inserted: Mutex<Vec<String>>,
    }

    impl ModuleInserter for CountingInserter {
        fn insert_module(&self, image: &ModuleImage, _params: &str) -> Result<(), String> {
            self.inserted.lock().unwrap().push(image.name.clone());
            Ok(())
        }
    }

    fn dispatcher(
        dir: &std::path::Path,
        aliases: AliasTable,
        inserter: Arc<CountingInserter>,
    ) -> ModaliasDispatcher {
        for name in ["usbmod", "genericusb"] {
            std::fs::write(dir.join(format!("{}.ko", name)), b"").unwrap();
        }
        let orchestrator = LoadOrchestrator::new(
            Arc::new(ModuleRegistry::new()),
            Arc::new(DependencyResolver::default()),
            Arc::new(ModuleLoader::new(dir, inserter)),
        );
        ModaliasDispatcher::new(Arc::new(aliases), orchestrator)
    }

    fn usb_aliases() -> AliasTable {
        AliasTable::from_pairs([("usb:v1234*", "usbmod"), ("usb:*", "genericusb")])
    }

    #[tokio::test]
    async fn test_unmatched_alias_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let d = dispatcher(dir.path(), usb_aliases(), Arc::new(CountingInserter::default()));
        let err = d.load_modalias("acpi:PNP0A03:").unwrap_err();
        assert_eq!(err, ModuleError::NoAliasMatch("acpi:PNP0A03:".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_pattern_is_swallowed() {
        let dir = tempfile::TempDir::new().unwrap();
        let inserter = Arc::new(CountingInserter::default());
        let aliases = AliasTable::from_pairs([("usb:*", "genericusb"), ("pci:[", "broken")]);
        let d = dispatcher(dir.path(), aliases, inserter.clone());
        assert!(d.load_modalias("pci:v00008086").unwrap().is_none());
        assert!(inserter.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_loads_each_matching_module_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let inserter = Arc::new(CountingInserter::default());
        let d = dispatcher(dir.path(), usb_aliases(), inserter.clone());

        let (tx, rx) = mpsc::channel(8);
        tx.send("usb:v1234p5678".to_string()).await.unwrap();
        tx.send("usb:v9999p0001".to_string()).await.unwrap();
        tx.send("acpi:PNP0A03:".to_string()).await.unwrap();
        drop(tx);

        d.run(rx).await;

        let mut inserted = inserter.inserted.lock().unwrap().clone();
        inserted.sort();
        assert_eq!(inserted, vec!["genericusb", "usbmod"]);
    }
}
