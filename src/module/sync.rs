use std::fmt;
use std::sync::{Arc, Mutex};

use crate::engine::Engine;
use crate::error::BackendError;
use crate::types::ModuleVariant;

use super::{LoadedModule, Readiness};

/// Engine module whose calls run inline on the calling task.
pub struct SyncModule {
    engine: Mutex<Engine>,
}

impl SyncModule {
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(Engine::new()),
        }
    }

    /// Load a module and run its startup check; readiness is resolved on return.
    #[must_use]
    pub fn load() -> LoadedModule {
        let outcome = Engine::startup().map(|version| {
            tracing::debug!(%version, "sync sqlite module ready");
        });
        LoadedModule {
            module: Arc::new(Self::new()),
            ready: Readiness::from_result(outcome),
        }
    }

    pub(crate) async fn with_engine<F, R>(&self, func: F) -> Result<R, BackendError>
    where
        F: FnOnce(&mut Engine) -> Result<R, BackendError> + Send + 'static,
        R: Send + 'static,
    {
        let mut guard = match self.engine.lock() {
            Ok(guard) => guard,
            // A panic inside a previous call leaves the handle tables intact.
            Err(poisoned) => poisoned.into_inner(),
        };
        func(&mut guard)
    }

    /// Statements prepared on this module and not yet finalized.
    #[must_use]
    pub fn open_statements(&self) -> usize {
        match self.engine.lock() {
            Ok(guard) => guard.open_statements(),
            Err(poisoned) => poisoned.into_inner().open_statements(),
        }
    }
}

impl Default for SyncModule {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyncModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncModule").finish_non_exhaustive()
    }
}

engine_backed_module!(SyncModule, ModuleVariant::Sync);
