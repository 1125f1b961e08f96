#![allow(dead_code)]

use std::collections::HashMap;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use embedded_sql_driver::api::{SqliteApi, factory};
use embedded_sql_driver::engine::{DbHandle, StmtHandle};
use embedded_sql_driver::module::SyncModule;
use embedded_sql_driver::prelude::*;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Where [`RecordingApi`] injects a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Prepare,
    Bind,
    Step,
}

struct Failure {
    at: FailAt,
    marker: String,
}

/// Backend double: forwards to a real module, counts statement handles and can
/// fail at prepare, bind or step for SQL containing a marker.
pub struct RecordingApi {
    module: Arc<SyncModule>,
    inner: Arc<dyn SqliteApi>,
    prepares: AtomicUsize,
    finalizes: AtomicUsize,
    prepared_sql: Mutex<Vec<String>>,
    exec_sql: Mutex<Vec<String>>,
    live: Mutex<HashMap<StmtHandle, String>>,
    failures: Mutex<Vec<Failure>>,
}

impl RecordingApi {
    pub fn new() -> Arc<Self> {
        let module = Arc::new(SyncModule::new());
        let inner = factory(Arc::clone(&module) as Arc<dyn BackendModule>);
        Arc::new(Self {
            module,
            inner,
            prepares: AtomicUsize::new(0),
            finalizes: AtomicUsize::new(0),
            prepared_sql: Mutex::new(Vec::new()),
            exec_sql: Mutex::new(Vec::new()),
            live: Mutex::new(HashMap::new()),
            failures: Mutex::new(Vec::new()),
        })
    }

    /// Fail at `at` for every statement whose SQL contains `marker`.
    pub fn fail(&self, at: FailAt, marker: &str) {
        self.failures.lock().unwrap().push(Failure {
            at,
            marker: marker.to_owned(),
        });
    }

    pub fn clear_failure(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn finalizes(&self) -> usize {
        self.finalizes.load(Ordering::SeqCst)
    }

    /// Statements still allocated in the engine.
    pub fn open_statements(&self) -> usize {
        self.module.open_statements()
    }

    /// SQL of every successfully prepared statement, in order.
    pub fn prepared_sql(&self) -> Vec<String> {
        self.prepared_sql.lock().unwrap().clone()
    }

    pub fn exec_sql(&self) -> Vec<String> {
        self.exec_sql.lock().unwrap().clone()
    }

    pub fn count_prepared(&self, prefix: &str) -> usize {
        self.prepared_sql()
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .count()
    }

    fn should_fail(&self, at: FailAt, sql: &str) -> bool {
        self.failures
            .lock()
            .unwrap()
            .iter()
            .any(|f| f.at == at && sql.contains(&f.marker))
    }

    fn sql_of(&self, stmt: StmtHandle) -> String {
        self.live
            .lock()
            .unwrap()
            .get(&stmt)
            .cloned()
            .unwrap_or_default()
    }

    fn injected(at: FailAt) -> BackendError {
        BackendError::new(1, format!("injected {at:?} failure"))
    }
}

#[async_trait]
impl SqliteApi for RecordingApi {
    async fn open_v2(
        &self,
        filename: &str,
        flags: OpenFlags,
        vfs: Option<&str>,
    ) -> Result<DbHandle, BackendError> {
        self.inner.open_v2(filename, flags, vfs).await
    }

    async fn close(&self, db: DbHandle) -> Result<(), BackendError> {
        self.inner.close(db).await
    }

    async fn exec(&self, db: DbHandle, sql: &str) -> Result<Vec<Vec<RowValues>>, BackendError> {
        self.exec_sql.lock().unwrap().push(sql.to_owned());
        self.inner.exec(db, sql).await
    }

    async fn prepare_v2(
        &self,
        db: DbHandle,
        sql: &str,
    ) -> Result<Option<StmtHandle>, BackendError> {
        if self.should_fail(FailAt::Prepare, sql) {
            return Err(Self::injected(FailAt::Prepare));
        }
        let stmt = self.inner.prepare_v2(db, sql).await?;
        if let Some(stmt) = stmt {
            self.prepares.fetch_add(1, Ordering::SeqCst);
            self.prepared_sql.lock().unwrap().push(sql.to_owned());
            self.live.lock().unwrap().insert(stmt, sql.to_owned());
        }
        Ok(stmt)
    }

    async fn bind_collection(
        &self,
        stmt: StmtHandle,
        params: &[RowValues],
    ) -> Result<(), BackendError> {
        if self.should_fail(FailAt::Bind, &self.sql_of(stmt)) {
            return Err(Self::injected(FailAt::Bind));
        }
        self.inner.bind_collection(stmt, params).await
    }

    async fn step(&self, stmt: StmtHandle) -> Result<i32, BackendError> {
        if self.should_fail(FailAt::Step, &self.sql_of(stmt)) {
            return Err(Self::injected(FailAt::Step));
        }
        self.inner.step(stmt).await
    }

    async fn column_names(&self, stmt: StmtHandle) -> Result<Vec<String>, BackendError> {
        self.inner.column_names(stmt).await
    }

    async fn row(&self, stmt: StmtHandle) -> Result<Vec<RowValues>, BackendError> {
        self.inner.row(stmt).await
    }

    async fn changes(&self, db: DbHandle) -> Result<u64, BackendError> {
        self.inner.changes(db).await
    }

    async fn finalize(&self, stmt: StmtHandle) -> Result<(), BackendError> {
        self.finalizes.fetch_add(1, Ordering::SeqCst);
        self.live.lock().unwrap().remove(&stmt);
        self.inner.finalize(stmt).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Query(String, Vec<RowValues>),
    Slow(String),
    Error(String),
}

#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingLogger {
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl QueryLogger for RecordingLogger {
    fn log_query(&self, query: &str, parameters: &[RowValues]) {
        self.events
            .lock()
            .unwrap()
            .push(LogEvent::Query(query.to_owned(), parameters.to_vec()));
    }

    fn log_query_slow(&self, _elapsed: Duration, query: &str, _parameters: &[RowValues]) {
        self.events
            .lock()
            .unwrap()
            .push(LogEvent::Slow(query.to_owned()));
    }

    fn log_query_error(&self, _error: &(dyn Error + 'static), query: &str, _parameters: &[RowValues]) {
        self.events
            .lock()
            .unwrap()
            .push(LogEvent::Error(query.to_owned()));
    }
}

/// Connected in-memory driver over `api`, plus its runner.
pub async fn connect_with(
    api: Arc<RecordingApi>,
    logger: Arc<RecordingLogger>,
) -> Result<(EmbeddedDriver, Arc<QueryRunner>), DriverError> {
    init_tracing();
    let driver = EmbeddedOptionsBuilder::new(":memory:")
        .driver(api)
        .logger(logger)
        .build();
    driver.connect().await?;
    let runner = driver.create_query_runner(ReplicationMode::Master);
    Ok((driver, runner))
}

/// Connected in-memory driver on the default sync module.
pub async fn memory_driver() -> Result<(EmbeddedDriver, Arc<QueryRunner>), DriverError> {
    init_tracing();
    let driver = EmbeddedOptionsBuilder::new(":memory:").build();
    driver.connect().await?;
    let runner = driver.create_query_runner(ReplicationMode::Master);
    Ok((driver, runner))
}
