use std::fmt;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use crate::error::BackendError;

/// One-shot signal that resolves once a module finished its startup sequence.
///
/// Cloning is cheap; every clone observes the same resolution.
#[derive(Clone)]
pub struct Readiness {
    inner: Shared<BoxFuture<'static, Result<(), BackendError>>>,
}

/// Sending half of a pending [`Readiness`].
pub struct ReadySignal {
    sender: oneshot::Sender<Result<(), BackendError>>,
}

impl Readiness {
    /// Already resolved successfully.
    #[must_use]
    pub fn resolved() -> Self {
        Self::from_result(Ok(()))
    }

    /// Already resolved with the given outcome.
    #[must_use]
    pub fn from_result(outcome: Result<(), BackendError>) -> Self {
        Self {
            inner: futures_util::future::ready(outcome).boxed().shared(),
        }
    }

    /// Unresolved until the returned [`ReadySignal`] fires.
    ///
    /// Dropping the signal without firing resolves the readiness with an error.
    #[must_use]
    pub fn pending() -> (ReadySignal, Readiness) {
        let (sender, receiver) = oneshot::channel();
        let inner = async move {
            receiver.await.unwrap_or_else(|_| {
                Err(BackendError::misuse(
                    "module startup ended without signalling readiness",
                ))
            })
        }
        .boxed()
        .shared();
        (ReadySignal { sender }, Readiness { inner })
    }

    /// Wait for the module to become ready.
    ///
    /// # Errors
    /// Returns the startup failure of the module, if any.
    pub async fn wait(&self) -> Result<(), BackendError> {
        self.inner.clone().await
    }

    /// Outcome if already resolved, without waiting.
    #[must_use]
    pub fn peek(&self) -> Option<Result<(), BackendError>> {
        self.inner.peek().cloned()
    }
}

impl ReadySignal {
    pub fn fire(self, outcome: Result<(), BackendError>) {
        // The receiving side may already be gone when nobody holds the readiness.
        let _ = self.sender.send(outcome);
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Readiness")
            .field("resolved", &self.peek().is_some())
            .finish()
    }
}

impl fmt::Debug for ReadySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadySignal").finish_non_exhaustive()
    }
}
