//! Utility modules shared by the loader and the command-line front end

pub mod error;
pub mod logging;
pub mod timeout;

// Re-export commonly used items
pub use error::{log_error, log_error_async};
pub use logging::{init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use timeout::{with_custom_timeout, DEFAULT_LOAD_TIMEOUT};
