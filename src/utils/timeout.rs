//! Timeout utilities
//!
//! Module loading itself has no deadline; callers that need one (mandatory
//! modules before the root filesystem is mounted) wrap the wait.

use std::time::Duration;
use tokio::time::timeout;

/// Deadline for mandatory modules when the boot config sets none
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Execute operation with custom timeout
pub async fn with_custom_timeout<F, T>(
    operation: F,
    duration: Duration,
) -> Result<T, tokio::time::error::Elapsed>
where
    F: std::future::Future<Output = T>,
{
    timeout(duration, operation).await
}
