use std::collections::VecDeque;
use std::sync::Arc;

use rusqlite::types::Value;

use super::DbHandle;

/// Engine-side state of one prepared statement.
///
/// Rows are produced by the first step and buffered; later steps drain the buffer.
#[derive(Debug)]
pub(crate) struct StatementSlot {
    pub(crate) db: DbHandle,
    pub(crate) sql: String,
    pub(crate) column_names: Arc<Vec<String>>,
    pub(crate) bindings: Vec<Value>,
    pub(crate) pending: Option<VecDeque<Vec<Value>>>,
    pub(crate) current: Option<Vec<Value>>,
}

impl StatementSlot {
    pub(crate) fn new(
        db: DbHandle,
        sql: String,
        column_names: Vec<String>,
        parameter_count: usize,
    ) -> Self {
        Self {
            db,
            sql,
            column_names: Arc::new(column_names),
            bindings: vec![Value::Null; parameter_count],
            pending: None,
            current: None,
        }
    }

    pub(crate) fn started(&self) -> bool {
        self.pending.is_some()
    }

    /// Advance to the next buffered row; `false` once exhausted.
    pub(crate) fn advance(&mut self) -> bool {
        self.current = self.pending.as_mut().and_then(VecDeque::pop_front);
        self.current.is_some()
    }
}
