//! Module loader implementation
//!
//! Finds `<modules_dir>/<name>.ko` and hands the opened image to a
//! [`ModuleInserter`]. The kernel-backed inserter uses `finit_module(2)`.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::module::traits::ModuleError;

/// Directory the image builder places module images in
pub const DEFAULT_MODULES_DIR: &str = "/usr/lib/modules";

/// Kernel's list of currently loaded modules
pub const PROC_MODULES: &str = "/proc/modules";

/// An opened module image
#[derive(Debug)]
pub struct ModuleImage {
    /// Module name
    pub name: String,
    /// Path the image was opened from
    pub path: PathBuf,
    /// Open handle to the image
    pub file: File,
}

/// Privileged module insertion
///
/// Implementations block until the kernel accepts or rejects the image and
/// may be called concurrently for different modules.
pub trait ModuleInserter: Send + Sync {
    /// Insert `image` with the parameter string `params`
    ///
    /// The error is the kernel-side cause, e.g. an unresolved symbol.
    fn insert_module(&self, image: &ModuleImage, params: &str) -> Result<(), String>;
}

/// Inserts modules into the running kernel
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelInserter;

#[cfg(target_os = "linux")]
impl ModuleInserter for KernelInserter {
    fn insert_module(&self, image: &ModuleImage, params: &str) -> Result<(), String> {
        use nix::errno::Errno;
        use nix::kmod::{finit_module, init_module, ModuleInitFlags};
        use std::ffi::CString;

        let params = CString::new(params).map_err(|e| format!("invalid parameters: {}", e))?;

        match finit_module(&image.file, &params, ModuleInitFlags::empty()) {
            Ok(()) => Ok(()),
            Err(Errno::EEXIST) => {
                debug!("Module {} already present in kernel", image.name);
                Ok(())
            }
            Err(Errno::ENOSYS) => {
                // Kernels without finit_module: pass the image bytes instead
                let bytes = std::fs::read(&image.path)
                    .map_err(|e| format!("read {:?}: {}", image.path, e))?;
                match init_module(&bytes, &params) {
                    Ok(()) | Err(Errno::EEXIST) => Ok(()),
                    Err(e) => Err(format!("init_module: {}", e)),
                }
            }
            Err(e) => Err(format!("finit_module: {}", e)),
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl ModuleInserter for KernelInserter {
    fn insert_module(&self, _image: &ModuleImage, _params: &str) -> Result<(), String> {
        Err("kernel module insertion is only supported on Linux".to_string())
    }
}

/// Module loader for a single modules directory
#[derive(Clone)]
pub struct ModuleLoader {
    modules_dir: PathBuf,
    inserter: Arc<dyn ModuleInserter>,
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("modules_dir", &self.modules_dir)
            .finish_non_exhaustive()
    }
}

impl ModuleLoader {
    /// Create a loader that inserts through `inserter`
    pub fn new<P: AsRef<Path>>(modules_dir: P, inserter: Arc<dyn ModuleInserter>) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
            inserter,
        }
    }

    /// Create a loader that inserts into the running kernel
    pub fn kernel<P: AsRef<Path>>(modules_dir: P) -> Self {
        Self::new(modules_dir, Arc::new(KernelInserter))
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Path of the image for `module`
    pub fn image_path(&self, module: &str) -> PathBuf {
        self.modules_dir.join(format!("{}.ko", module))
    }

    /// Load `module` with an empty parameter string
    ///
    /// Blocking; run it off the async executor.
    pub fn load_file(&self, module: &str) -> Result<(), ModuleError> {
        let path = self.image_path(module);
        let file = File::open(&path)
            .map_err(|e| ModuleError::load(module, format!("open {:?}: {}", path, e)))?;

        let image = ModuleImage {
            name: module.to_string(),
            path,
            file,
        };

        debug!("loading module {}", module);
        self.inserter
            .insert_module(&image, "")
            .map_err(|cause| ModuleError::load(module, cause))?;

        info!("Module {} loaded", module);
        Ok(())
    }
}

/// Parse `/proc/modules` contents into module names
pub fn parse_proc_modules(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Names of the modules already present in the kernel
pub fn read_loaded_modules<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ModuleError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ModuleError::ConfigError(format!("Failed to read {:?}: {}", path, e)))?;
    Ok(parse_proc_modules(&contents))
}
