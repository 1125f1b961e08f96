// Query runner - executes SQL against the driver's connection
//
// - mod: prepare / bind / step / finalize for a single query
// - transaction: BEGIN / COMMIT / ROLLBACK with savepoints for nesting
// - schema: migration hooks and dropping every view and table

mod schema;
mod transaction;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::api::SqliteApi;
use crate::conversion::normalize_params;
use crate::driver::DriverCore;
use crate::engine::{DbHandle, StmtHandle, codes};
use crate::error::{BackendError, DriverError};
use crate::results::{QueryResult, Record, RecordBuilder};
use crate::types::RowValues;

const INSERT_PREFIX: &str = "INSERT ";
const LAST_INSERT_ROWID: &str = "SELECT last_insert_rowid()";

/// Runs queries on the connection of one [`crate::driver::EmbeddedDriver`].
///
/// Obtained from [`crate::driver::EmbeddedDriver::create_query_runner`]. Queries on
/// one runner run one at a time, in the order they acquire the runner.
pub struct QueryRunner {
    core: Arc<DriverCore>,
    released: AtomicBool,
    transaction_depth: AtomicUsize,
    exec_lock: Mutex<()>,
}

impl QueryRunner {
    pub(crate) fn new(core: Arc<DriverCore>) -> Self {
        Self {
            core,
            released: AtomicBool::new(false),
            transaction_depth: AtomicUsize::new(0),
            exec_lock: Mutex::new(()),
        }
    }

    /// Stop accepting queries. Further calls fail with `DriverError::RunnerReleased`.
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Run `sql` and return its records.
    ///
    /// `None` parameters are bound as SQL `NULL`. When `sql` starts with `INSERT `
    /// the generated row id is appended as a trailing [`Record::Value`].
    ///
    /// # Errors
    /// - `DriverError::RunnerReleased` after [`QueryRunner::release`]
    /// - `DriverError::BackendUnavailable` when the backend never loaded
    /// - `DriverError::ConnectionError` when the driver is not connected
    /// - `DriverError::QueryFailed` when prepare, bind or step fails
    pub async fn query(
        &self,
        sql: &str,
        params: &[Option<RowValues>],
    ) -> Result<Vec<Record>, DriverError> {
        Ok(self.run(sql, params).await?.into_records())
    }

    /// Like [`QueryRunner::query`] but also returns the affected-row count.
    ///
    /// # Errors
    /// Same as [`QueryRunner::query`].
    pub async fn query_structured(
        &self,
        sql: &str,
        params: &[Option<RowValues>],
    ) -> Result<QueryResult, DriverError> {
        self.run(sql, params).await
    }

    async fn run(&self, sql: &str, params: &[Option<RowValues>]) -> Result<QueryResult, DriverError> {
        if self.is_released() {
            return Err(DriverError::RunnerReleased);
        }
        let api = self.core.api().await?;
        let db = self.core.connection_handle()?;
        let parameters = normalize_params(params);
        let logger = &self.core.options().logger;
        logger.log_query(sql, &parameters);

        let _guard = self.exec_lock.lock().await;
        let mut stmt = None;
        match self
            .execute(api.as_ref(), db, sql, &parameters, &mut stmt)
            .await
        {
            Ok(result) => Ok(result),
            Err(err) => {
                if let Some(stmt) = stmt.take()
                    && let Err(finalize_err) = api.finalize(stmt).await
                {
                    tracing::debug!(error = %finalize_err, %stmt, "finalize after failed query");
                }
                logger.log_query_error(&err, sql, &parameters);
                Err(DriverError::QueryFailed {
                    query: sql.to_owned(),
                    parameters,
                    source: err,
                })
            }
        }
    }

    /// One query end to end. A prepared statement sits in `slot` until it is finalized,
    /// so the caller can clean it up when this returns early.
    async fn execute(
        &self,
        api: &dyn SqliteApi,
        db: DbHandle,
        sql: &str,
        parameters: &[RowValues],
        slot: &mut Option<StmtHandle>,
    ) -> Result<QueryResult, BackendError> {
        let started = Instant::now();
        let Some(stmt) = api.prepare_v2(db, sql).await? else {
            // whitespace only
            return Ok(QueryResult {
                affected: api.changes(db).await?,
                records: Vec::new(),
            });
        };
        *slot = Some(stmt);
        api.bind_collection(stmt, parameters).await?;
        self.check_slow(started.elapsed(), sql, parameters);

        let mut records = RecordBuilder::new(api.column_names(stmt).await?);
        loop {
            match api.step(stmt).await? {
                codes::SQLITE_ROW => records.push_row(api.row(stmt).await?),
                codes::SQLITE_DONE => break,
                code => {
                    return Err(BackendError::new(
                        code,
                        format!("unexpected step result {code} for {stmt}"),
                    ));
                }
            }
        }
        let affected = api.changes(db).await?;

        slot.take();
        api.finalize(stmt).await?;

        if sql.starts_with(INSERT_PREFIX) {
            for row in api.exec(db, LAST_INSERT_ROWID).await? {
                if let Some(id) = row.into_iter().next() {
                    records.push_value(id);
                }
            }
        }
        Ok(records.finish(affected))
    }

    fn check_slow(&self, elapsed: Duration, sql: &str, parameters: &[RowValues]) {
        let opts = self.core.options();
        if let Some(threshold) = opts.max_query_execution_time
            && elapsed > threshold
        {
            opts.logger.log_query_slow(elapsed, sql, parameters);
        }
    }
}

impl fmt::Debug for QueryRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRunner")
            .field("released", &self.is_released())
            .field("transaction_depth", &self.transaction_depth.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
