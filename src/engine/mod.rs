//! In-process `SQLite` engine addressed through opaque handles.
//!
//! The engine owns every native connection and statement; callers only ever see
//! [`DbHandle`] and [`StmtHandle`] values, the same way a hosted module exposes
//! integer pointers to its callers.

mod statement;

use std::collections::{HashMap, VecDeque};
use std::fmt;

use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::types::Value;
use rusqlite::{Batch, Connection, OpenFlags};

use crate::error::BackendError;
use statement::StatementSlot;

/// Result codes shared with the native library.
pub mod codes {
    pub const SQLITE_OK: i32 = rusqlite::ffi::SQLITE_OK;
    pub const SQLITE_ERROR: i32 = rusqlite::ffi::SQLITE_ERROR;
    pub const SQLITE_BUSY: i32 = rusqlite::ffi::SQLITE_BUSY;
    pub const SQLITE_MISUSE: i32 = rusqlite::ffi::SQLITE_MISUSE;
    pub const SQLITE_RANGE: i32 = rusqlite::ffi::SQLITE_RANGE;
    pub const SQLITE_ROW: i32 = rusqlite::ffi::SQLITE_ROW;
    pub const SQLITE_DONE: i32 = rusqlite::ffi::SQLITE_DONE;
}

/// Opaque handle to an open database connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DbHandle(pub(crate) u64);

/// Opaque handle to a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtHandle(pub(crate) u64);

impl DbHandle {
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl StmtHandle {
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "db#{}", self.0)
    }
}

impl fmt::Display for StmtHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

#[derive(Default)]
pub struct Engine {
    connections: HashMap<DbHandle, Connection>,
    statements: HashMap<StmtHandle, StatementSlot>,
    next_handle: u64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("connections", &self.connections.len())
            .field("statements", &self.statements.len())
            .finish()
    }
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Smoke-test the native library; returns its version string.
    ///
    /// # Errors
    /// Returns [`BackendError`] if an in-memory database cannot be opened or queried.
    pub fn startup() -> Result<String, BackendError> {
        let conn = Connection::open_in_memory()?;
        let version: String = conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
        Ok(version)
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn connection(&self, db: DbHandle) -> Result<&Connection, BackendError> {
        self.connections
            .get(&db)
            .ok_or_else(|| BackendError::misuse(format!("unknown connection handle {db}")))
    }

    fn slot(&self, stmt: StmtHandle) -> Result<&StatementSlot, BackendError> {
        self.statements
            .get(&stmt)
            .ok_or_else(|| BackendError::misuse(format!("unknown statement handle {stmt}")))
    }

    fn slot_mut(&mut self, stmt: StmtHandle) -> Result<&mut StatementSlot, BackendError> {
        self.statements
            .get_mut(&stmt)
            .ok_or_else(|| BackendError::misuse(format!("unknown statement handle {stmt}")))
    }

    /// Open a connection.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the native open call fails (bad path, unknown VFS, flags).
    pub fn open(
        &mut self,
        filename: &str,
        flags: OpenFlags,
        vfs: Option<&str>,
    ) -> Result<DbHandle, BackendError> {
        let conn = match vfs {
            Some(vfs) => Connection::open_with_flags_and_vfs(filename, flags, vfs)?,
            None => Connection::open_with_flags(filename, flags)?,
        };
        let handle = DbHandle(self.allocate());
        self.connections.insert(handle, conn);
        Ok(handle)
    }

    /// Close a connection.
    ///
    /// # Errors
    /// Returns `SQLITE_BUSY` while statements of this connection are still unfinalized.
    pub fn close(&mut self, db: DbHandle) -> Result<(), BackendError> {
        self.connection(db)?;
        let outstanding = self.statements.values().filter(|s| s.db == db).count();
        if outstanding > 0 {
            return Err(BackendError::busy(format!(
                "unable to close {db}: {outstanding} unfinalized statement(s)"
            )));
        }
        if let Some(conn) = self.connections.remove(&db) {
            conn.close().map_err(|(_, err)| BackendError::from(err))?;
        }
        Ok(())
    }

    /// Compile one statement. Whitespace-only SQL yields no statement.
    ///
    /// # Errors
    /// Returns [`BackendError`] when the SQL does not compile or holds more than
    /// one statement. Use [`Engine::exec`] for scripts.
    pub fn prepare(&mut self, db: DbHandle, sql: &str) -> Result<Option<StmtHandle>, BackendError> {
        if sql.trim().is_empty() {
            self.connection(db)?;
            return Ok(None);
        }
        let (column_names, parameter_count) = {
            let conn = self.connection(db)?;
            let stmt = conn.prepare_cached(sql)?;
            let names = stmt
                .column_names()
                .iter()
                .map(|name| (*name).to_string())
                .collect::<Vec<_>>();
            (names, stmt.parameter_count())
        };
        let handle = StmtHandle(self.allocate());
        self.statements.insert(
            handle,
            StatementSlot::new(db, sql.to_owned(), column_names, parameter_count),
        );
        Ok(Some(handle))
    }

    #[must_use]
    pub fn is_prepared(&self, stmt: StmtHandle) -> bool {
        self.statements.contains_key(&stmt)
    }

    /// Number of statements that have not been finalized yet.
    #[must_use]
    pub fn open_statements(&self) -> usize {
        self.statements.len()
    }

    /// Parameter count of a prepared statement.
    ///
    /// # Errors
    /// Returns `SQLITE_MISUSE` for an unknown handle.
    pub fn bind_parameter_count(&self, stmt: StmtHandle) -> Result<usize, BackendError> {
        Ok(self.slot(stmt)?.bindings.len())
    }

    /// Bind one value; `index` is 1-based.
    ///
    /// # Errors
    /// Returns `SQLITE_RANGE` for an index outside the statement's parameters and
    /// `SQLITE_MISUSE` once stepping has started.
    pub fn bind(&mut self, stmt: StmtHandle, index: usize, value: Value) -> Result<(), BackendError> {
        let slot = self.slot_mut(stmt)?;
        if slot.started() {
            return Err(BackendError::misuse(format!(
                "cannot bind {stmt} after stepping started"
            )));
        }
        let count = slot.bindings.len();
        match index.checked_sub(1).and_then(|i| slot.bindings.get_mut(i)) {
            Some(target) => {
                *target = value;
                Ok(())
            }
            None => Err(BackendError::range(format!(
                "bind index {index} out of range for {stmt} ({count} parameter(s))"
            ))),
        }
    }

    /// Step a statement, returning `SQLITE_ROW` or `SQLITE_DONE`.
    ///
    /// # Errors
    /// Returns [`BackendError`] when executing the statement fails.
    pub fn step(&mut self, stmt: StmtHandle) -> Result<i32, BackendError> {
        let slot = self
            .statements
            .get_mut(&stmt)
            .ok_or_else(|| BackendError::misuse(format!("unknown statement handle {stmt}")))?;
        if !slot.started() {
            let conn = self
                .connections
                .get(&slot.db)
                .ok_or_else(|| BackendError::misuse(format!("connection of {stmt} is closed")))?;
            slot.pending = Some(run_statement(conn, &slot.sql, &slot.bindings)?);
        }
        if slot.advance() {
            Ok(codes::SQLITE_ROW)
        } else {
            Ok(codes::SQLITE_DONE)
        }
    }

    /// Column names of a statement, in declaration order.
    ///
    /// # Errors
    /// Returns `SQLITE_MISUSE` for an unknown handle.
    pub fn column_names(&self, stmt: StmtHandle) -> Result<Vec<String>, BackendError> {
        Ok(self.slot(stmt)?.column_names.as_ref().clone())
    }

    /// Values of the row the statement currently points at.
    ///
    /// # Errors
    /// Returns `SQLITE_MISUSE` when there is no current row.
    pub fn row(&self, stmt: StmtHandle) -> Result<Vec<Value>, BackendError> {
        self.slot(stmt)?
            .current
            .clone()
            .ok_or_else(|| BackendError::misuse(format!("{stmt} has no current row")))
    }

    /// Rows changed by the most recent INSERT/UPDATE/DELETE on the connection.
    ///
    /// # Errors
    /// Returns `SQLITE_MISUSE` for an unknown handle.
    pub fn changes(&self, db: DbHandle) -> Result<u64, BackendError> {
        let conn = self.connection(db)?;
        Ok(u64::try_from(conn.changes()).unwrap_or(u64::MAX))
    }

    /// Release a statement.
    ///
    /// # Errors
    /// Returns `SQLITE_MISUSE` for an unknown or already finalized handle.
    pub fn finalize(&mut self, stmt: StmtHandle) -> Result<(), BackendError> {
        self.statements
            .remove(&stmt)
            .map(|_| ())
            .ok_or_else(|| BackendError::misuse(format!("unknown statement handle {stmt}")))
    }

    /// Run every statement in `sql` and return all rows they produce.
    ///
    /// # Errors
    /// Returns [`BackendError`] at the first statement that fails.
    pub fn exec(&mut self, db: DbHandle, sql: &str) -> Result<Vec<Vec<Value>>, BackendError> {
        let conn = self.connection(db)?;
        let mut rows_out = Vec::new();
        let mut batch = Batch::new(conn, sql);
        while let Some(mut stmt) = batch.next()? {
            let column_count = stmt.column_count();
            let mut rows = stmt.raw_query();
            while let Some(row) = rows.next()? {
                rows_out.push(read_row(row, column_count)?);
            }
        }
        Ok(rows_out)
    }
}

fn run_statement(
    conn: &Connection,
    sql: &str,
    bindings: &[Value],
) -> Result<VecDeque<Vec<Value>>, BackendError> {
    let mut stmt = conn.prepare_cached(sql)?;
    for (idx, value) in bindings.iter().enumerate() {
        stmt.raw_bind_parameter(idx + 1, value)?;
    }
    let column_count = stmt.column_count();
    let mut buffered = VecDeque::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        buffered.push_back(read_row(row, column_count)?);
    }
    Ok(buffered)
}

fn read_row(row: &rusqlite::Row<'_>, column_count: usize) -> Result<Vec<Value>, BackendError> {
    (0..column_count)
        .map(|idx| row.get::<_, Value>(idx).map_err(BackendError::from))
        .collect()
}
