//! Boot configuration
//!
//! Written into the image by the image builder and read once at startup.
//! Everything the module loader consumes (dependency map, mandatory module
//! list, alias file location) lives here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::module::loader::DEFAULT_MODULES_DIR;
use crate::module::traits::ModuleError;
use crate::utils::timeout::DEFAULT_LOAD_TIMEOUT;

/// Default location of the boot configuration
pub const DEFAULT_CONFIG_PATH: &str = "/etc/booster.init.toml";

/// Alias file name inside the modules directory
pub const ALIAS_FILE_NAME: &str = "booster.alias";

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter, e.g. "info" or "bootmod=debug"; RUST_LOG takes precedence
    #[serde(default)]
    pub filter: Option<String>,

    /// Enable debug output for the loader
    #[serde(default)]
    pub debug: bool,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Init configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitConfig {
    /// Module name -> modules that must be loaded first
    #[serde(default)]
    pub module_dependencies: HashMap<String, Vec<String>>,

    /// Modules that must be loaded before boot proceeds
    #[serde(default)]
    pub modules_force_load: Vec<String>,

    /// Kernel release this image was built for
    #[serde(default)]
    pub kernel: Option<String>,

    /// Seconds to wait for mandatory modules
    #[serde(default)]
    pub mount_timeout: Option<u64>,

    /// Directory containing `<name>.ko` images
    #[serde(default)]
    pub modules_dir: Option<PathBuf>,

    /// Alias file; defaults to `booster.alias` inside `modules_dir`
    #[serde(default)]
    pub alias_file: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl std::str::FromStr for InitConfig {
    type Err = ModuleError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(contents)?)
    }
}

impl InitConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ModuleError::ConfigError(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        contents.parse()
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.modules_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODULES_DIR))
    }

    pub fn alias_file(&self) -> PathBuf {
        self.alias_file
            .clone()
            .unwrap_or_else(|| self.modules_dir().join(ALIAS_FILE_NAME))
    }

    /// Deadline for mandatory modules
    pub fn load_timeout(&self) -> Duration {
        self.mount_timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LOAD_TIMEOUT)
    }

    /// Fail if the image was built for a different kernel than `running`
    pub fn check_kernel_release(&self, running: &str) -> Result<(), ModuleError> {
        match &self.kernel {
            Some(expected) if expected != running => Err(ModuleError::ConfigError(format!(
                "Image built for kernel {} but running {}",
                expected, running
            ))),
            _ => Ok(()),
        }
    }
}

/// Release string of the running kernel (`uname -r`)
#[cfg(unix)]
pub fn running_kernel_release() -> Result<String, ModuleError> {
    let uts = nix::sys::utsname::uname()
        .map_err(|e| ModuleError::ConfigError(format!("uname failed: {}", e)))?;
    Ok(uts.release().to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: InitConfig = r#"
kernel = "6.6.8-arch1-1"
mount_timeout = 15
modules_force_load = ["ext4", "nvme"]
modules_dir = "/lib/modules"

[module_dependencies]
ext4 = ["crc16", "mbcache", "jbd2"]
nvme = ["nvme_core"]

[logging]
debug = true
"#
        .parse()
        .unwrap();

        assert_eq!(config.modules_force_load, vec!["ext4", "nvme"]);
        assert_eq!(config.module_dependencies["ext4"], vec!["crc16", "mbcache", "jbd2"]);
        assert_eq!(config.load_timeout(), Duration::from_secs(15));
        assert_eq!(config.alias_file(), PathBuf::from("/lib/modules/booster.alias"));
        assert!(config.logging.unwrap().debug);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: InitConfig = "".parse().unwrap();
        assert!(config.module_dependencies.is_empty());
        assert_eq!(config.modules_dir(), PathBuf::from(DEFAULT_MODULES_DIR));
        assert_eq!(config.load_timeout(), DEFAULT_LOAD_TIMEOUT);
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let err = "module_dependencies = 3".parse::<InitConfig>().unwrap_err();
        assert!(matches!(err, ModuleError::ConfigError(_)));
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = InitConfig::from_file(dir.path().join("init.toml")).unwrap_err();
        assert!(matches!(err, ModuleError::ConfigError(_)));
    }

    #[test]
    fn test_kernel_release_check() {
        let config = InitConfig {
            kernel: Some("6.6.8-arch1-1".to_string()),
            ..Default::default()
        };
        assert!(config.check_kernel_release("6.6.8-arch1-1").is_ok());
        assert!(config.check_kernel_release("6.7.0").is_err());
        assert!(InitConfig::default().check_kernel_release("anything").is_ok());
    }
}
