//! Completion handles for module load attempts

use futures::future::{join_all, BoxFuture, FutureExt};
use tokio::sync::oneshot;

use crate::module::traits::{LoadOutcome, ModuleError};

/// Signals that a load attempt (or a group of them) has finished
///
/// Each waiter on an in-flight attempt holds its own handle; the registry
/// releases all of them with the same outcome. Handles for several attempts
/// combine with [`CompletionHandle::all`].
#[derive(Debug)]
pub struct CompletionHandle {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Ready(LoadOutcome),
    Pending {
        module: String,
        rx: oneshot::Receiver<LoadOutcome>,
    },
    All(Vec<CompletionHandle>),
}

impl CompletionHandle {
    /// Handle that is already resolved
    pub fn ready(outcome: LoadOutcome) -> Self {
        Self {
            inner: Inner::Ready(outcome),
        }
    }

    /// Already-resolved success
    pub fn success() -> Self {
        Self::ready(Ok(()))
    }

    /// Already-resolved failure
    pub fn failed(error: ModuleError) -> Self {
        Self::ready(Err(error))
    }

    /// Handle released through `rx`; a dropped sender resolves as a load failure of `module`
    pub(crate) fn pending(module: impl Into<String>, rx: oneshot::Receiver<LoadOutcome>) -> Self {
        Self {
            inner: Inner::Pending {
                module: module.into(),
                rx,
            },
        }
    }

    /// Aggregate that resolves once every member has resolved
    ///
    /// Fails with the first member failure, in member order.
    pub fn all<I>(handles: I) -> Self
    where
        I: IntoIterator<Item = CompletionHandle>,
    {
        let mut members = Vec::new();
        for handle in handles {
            match handle.inner {
                Inner::All(nested) => members.extend(nested),
                Inner::Ready(Ok(())) => {}
                other => members.push(CompletionHandle { inner: other }),
            }
        }
        match members.len() {
            0 => Self::success(),
            1 => members.remove(0),
            _ => Self {
                inner: Inner::All(members),
            },
        }
    }

    /// Whether the outcome is known without waiting
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, Inner::Ready(_))
    }

    /// Wait for the outcome
    pub fn wait(self) -> BoxFuture<'static, LoadOutcome> {
        async move {
            match self.inner {
                Inner::Ready(outcome) => outcome,
                Inner::Pending { module, rx } => match rx.await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ModuleError::load(module, "load attempt aborted")),
                },
                Inner::All(members) => {
                    let outcomes = join_all(members.into_iter().map(CompletionHandle::wait)).await;
                    outcomes.into_iter().collect::<Result<Vec<()>, _>>().map(|_| ())
                }
            }
        }
        .boxed()
    }
}
