//! Callable backend API built on top of a loaded module.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::OpenFlags;

use crate::conversion::{from_engine_value, to_engine_value};
use crate::engine::{DbHandle, StmtHandle};
use crate::error::BackendError;
use crate::module::BackendModule;
use crate::types::RowValues;

/// Backend instance used by the driver and its query runner.
///
/// [`factory`] builds one from a loaded module; callers may also supply their own
/// implementation (for instance to instrument calls).
#[async_trait]
pub trait SqliteApi: Send + Sync {
    async fn open_v2(
        &self,
        filename: &str,
        flags: OpenFlags,
        vfs: Option<&str>,
    ) -> Result<DbHandle, BackendError>;

    async fn close(&self, db: DbHandle) -> Result<(), BackendError>;

    /// Run all statements in `sql`, returning every produced row.
    async fn exec(&self, db: DbHandle, sql: &str) -> Result<Vec<Vec<RowValues>>, BackendError>;

    async fn prepare_v2(
        &self,
        db: DbHandle,
        sql: &str,
    ) -> Result<Option<StmtHandle>, BackendError>;

    /// Bind `params` positionally, the first value to parameter 1.
    async fn bind_collection(
        &self,
        stmt: StmtHandle,
        params: &[RowValues],
    ) -> Result<(), BackendError>;

    async fn step(&self, stmt: StmtHandle) -> Result<i32, BackendError>;

    async fn column_names(&self, stmt: StmtHandle) -> Result<Vec<String>, BackendError>;

    async fn row(&self, stmt: StmtHandle) -> Result<Vec<RowValues>, BackendError>;

    async fn changes(&self, db: DbHandle) -> Result<u64, BackendError>;

    async fn finalize(&self, stmt: StmtHandle) -> Result<(), BackendError>;
}

/// [`SqliteApi`] over a [`BackendModule`].
pub struct ModuleApi {
    module: Arc<dyn BackendModule>,
}

impl ModuleApi {
    #[must_use]
    pub fn new(module: Arc<dyn BackendModule>) -> Self {
        Self { module }
    }

    #[must_use]
    pub fn module(&self) -> &Arc<dyn BackendModule> {
        &self.module
    }
}

/// Build a backend instance from a loaded module.
#[must_use]
pub fn factory(module: Arc<dyn BackendModule>) -> Arc<dyn SqliteApi> {
    Arc::new(ModuleApi::new(module))
}

#[async_trait]
impl SqliteApi for ModuleApi {
    async fn open_v2(
        &self,
        filename: &str,
        flags: OpenFlags,
        vfs: Option<&str>,
    ) -> Result<DbHandle, BackendError> {
        self.module.open(filename, flags, vfs).await
    }

    async fn close(&self, db: DbHandle) -> Result<(), BackendError> {
        self.module.close(db).await
    }

    async fn exec(&self, db: DbHandle, sql: &str) -> Result<Vec<Vec<RowValues>>, BackendError> {
        let rows = self.module.exec(db, sql).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(from_engine_value).collect())
            .collect())
    }

    async fn prepare_v2(
        &self,
        db: DbHandle,
        sql: &str,
    ) -> Result<Option<StmtHandle>, BackendError> {
        self.module.prepare(db, sql).await
    }

    async fn bind_collection(
        &self,
        stmt: StmtHandle,
        params: &[RowValues],
    ) -> Result<(), BackendError> {
        let expected = self.module.bind_parameter_count(stmt).await?;
        if params.len() > expected {
            return Err(BackendError::range(format!(
                "{} parameter(s) supplied but {stmt} takes {expected}",
                params.len()
            )));
        }
        for (idx, param) in params.iter().enumerate() {
            self.module
                .bind(stmt, idx + 1, to_engine_value(param))
                .await?;
        }
        Ok(())
    }

    async fn step(&self, stmt: StmtHandle) -> Result<i32, BackendError> {
        self.module.step(stmt).await
    }

    async fn column_names(&self, stmt: StmtHandle) -> Result<Vec<String>, BackendError> {
        self.module.column_names(stmt).await
    }

    async fn row(&self, stmt: StmtHandle) -> Result<Vec<RowValues>, BackendError> {
        let values = self.module.row(stmt).await?;
        Ok(values.into_iter().map(from_engine_value).collect())
    }

    async fn changes(&self, db: DbHandle) -> Result<u64, BackendError> {
        self.module.changes(db).await
    }

    async fn finalize(&self, stmt: StmtHandle) -> Result<(), BackendError> {
        self.module.finalize(stmt).await
    }
}
