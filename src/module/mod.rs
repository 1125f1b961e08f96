// Module layer - loads the embedded engine and hands out shared module instances
//
// - readiness: one-shot startup signal
// - sync: engine running inline behind a mutex
// - worker: engine owned by a dedicated worker thread
// - provider: process-wide, per-variant module cache

#[macro_use]
mod macros;
mod provider;
mod readiness;
mod sync;
mod worker;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::OpenFlags;
use rusqlite::types::Value;

use crate::engine::{DbHandle, StmtHandle};
use crate::error::BackendError;
use crate::types::ModuleVariant;

pub use provider::{ModuleLoader, ModuleProvider};
pub use readiness::{ReadySignal, Readiness};
pub use sync::SyncModule;
pub use worker::AsyncModule;

/// Raw entry points of a loaded engine module.
///
/// This is the low-level surface the [`crate::api::factory`] builds a
/// [`crate::api::SqliteApi`] from. Values are the engine's own storage classes.
#[async_trait]
pub trait BackendModule: Send + Sync {
    fn variant(&self) -> ModuleVariant;

    async fn open(
        &self,
        filename: &str,
        flags: OpenFlags,
        vfs: Option<&str>,
    ) -> Result<DbHandle, BackendError>;

    async fn close(&self, db: DbHandle) -> Result<(), BackendError>;

    async fn exec(&self, db: DbHandle, sql: &str) -> Result<Vec<Vec<Value>>, BackendError>;

    async fn prepare(&self, db: DbHandle, sql: &str) -> Result<Option<StmtHandle>, BackendError>;

    async fn bind_parameter_count(&self, stmt: StmtHandle) -> Result<usize, BackendError>;

    async fn bind(&self, stmt: StmtHandle, index: usize, value: Value)
    -> Result<(), BackendError>;

    async fn step(&self, stmt: StmtHandle) -> Result<i32, BackendError>;

    async fn column_names(&self, stmt: StmtHandle) -> Result<Vec<String>, BackendError>;

    async fn row(&self, stmt: StmtHandle) -> Result<Vec<Value>, BackendError>;

    async fn changes(&self, db: DbHandle) -> Result<u64, BackendError>;

    async fn finalize(&self, stmt: StmtHandle) -> Result<(), BackendError>;
}

/// A module together with its startup signal.
#[derive(Clone)]
pub struct LoadedModule {
    pub module: Arc<dyn BackendModule>,
    pub ready: Readiness,
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("variant", &self.module.variant())
            .field("ready", &self.ready)
            .finish()
    }
}

/// Load a fresh module of the given variant.
///
/// This is the expensive path; go through [`ModuleProvider`] to share one
/// instance per variant.
#[must_use]
pub fn load_module(variant: ModuleVariant) -> LoadedModule {
    tracing::debug!(variant = variant.name(), "loading sqlite module");
    match variant {
        ModuleVariant::Sync => SyncModule::load(),
        ModuleVariant::Async => AsyncModule::load(),
    }
}
