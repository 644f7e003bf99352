//! modload - load kernel modules the way the init does at boot
//!
//! Loads the mandatory modules from the boot config (plus any given on the
//! command line) with the configured deadline, then dispatches modalias
//! strings best-effort.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use bootmod::config::{running_kernel_release, DEFAULT_CONFIG_PATH};
use bootmod::module::loader::{read_loaded_modules, PROC_MODULES};
use bootmod::utils::{init_logging_from_config, log_error};
use bootmod::{orchestrator_from_config, AliasTable, InitConfig, KernelInserter, ModaliasDispatcher};

#[derive(Debug, Parser)]
#[command(name = "modload", version, about = "Load kernel modules with dependency ordering")]
struct Args {
    /// Boot configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory containing module images (overrides config)
    #[arg(long)]
    modules_dir: Option<PathBuf>,

    /// Alias file (overrides config)
    #[arg(long)]
    alias_file: Option<PathBuf>,

    /// Seconds to wait for mandatory modules (overrides config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Skip the kernel release check
    #[arg(long)]
    no_kernel_check: bool,

    /// Modalias strings to load drivers for
    #[arg(long = "modalias", value_name = "ID")]
    modaliases: Vec<String>,

    /// Additional mandatory modules
    modules: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = if args.config.exists() {
        InitConfig::from_file(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        InitConfig::default()
    };
    if let Some(dir) = args.modules_dir {
        config.modules_dir = Some(dir);
    }
    if let Some(file) = args.alias_file {
        config.alias_file = Some(file);
    }
    if let Some(secs) = args.timeout {
        config.mount_timeout = Some(secs);
    }

    init_logging_from_config(config.logging.as_ref());

    if !args.no_kernel_check {
        let release = running_kernel_release()?;
        config.check_kernel_release(&release)?;
    }

    let aliases = log_error(|| AliasTable::load(config.alias_file()), "Alias matching disabled")
        .unwrap_or_else(AliasTable::empty);
    let already_loaded =
        log_error(|| read_loaded_modules(PROC_MODULES), "Cannot read loaded modules")
            .unwrap_or_default();

    let orchestrator = orchestrator_from_config(&config, Arc::new(KernelInserter), already_loaded);

    let mut mandatory = config.modules_force_load.clone();
    mandatory.extend(args.modules);
    if !mandatory.is_empty() {
        let timeout: Duration = config.load_timeout();
        info!("Loading mandatory modules {:?}", mandatory);
        if let Err(e) = orchestrator
            .request_modules_with_timeout(&mandatory, timeout)
            .await
        {
            error!("Mandatory module load failed: {}", e);
            bail!("mandatory modules {:?} not loaded: {}", mandatory, e);
        }
    }

    if !args.modaliases.is_empty() {
        let dispatcher = ModaliasDispatcher::new(Arc::new(aliases), orchestrator.clone());
        let (tx, rx) = mpsc::channel(args.modaliases.len());
        for alias in args.modaliases {
            if tx.send(alias).await.is_err() {
                warn!("Modalias dispatcher stopped early");
                break;
            }
        }
        drop(tx);
        dispatcher.run(rx).await;
    }

    info!("Loaded modules: {:?}", orchestrator.registry().loaded_modules());
    Ok(())
}
