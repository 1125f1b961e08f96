mod row;

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

pub use row::Row;

/// One entry of a query's record list.
#[derive(Debug, Clone)]
pub enum Record {
    /// A row produced by the statement
    Row(Row),
    /// A bare value appended by the driver, e.g. the row id generated by an `INSERT `
    Value(RowValues),
}

impl Record {
    #[must_use]
    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Record::Row(row) => Some(row),
            Record::Value(_) => None,
        }
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&RowValues> {
        match self {
            Record::Value(value) => Some(value),
            Record::Row(_) => None,
        }
    }

    /// Shorthand for `as_row()?.get(column)`.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.as_row().and_then(|row| row.get(column_name))
    }
}

/// Structured outcome of a query: affected-row count plus records.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Rows changed by the most recent INSERT/UPDATE/DELETE on the connection
    pub affected: u64,
    /// Rows in statement order, followed by any driver-appended values
    pub records: Vec<Record>,
}

impl QueryResult {
    /// Raw backend output; the same records as [`QueryResult::records`].
    #[must_use]
    pub fn raw(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.records.iter().filter_map(Record::as_row)
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Accumulates rows that share one column list.
#[derive(Debug)]
pub(crate) struct RecordBuilder {
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    records: Vec<Record>,
}

impl RecordBuilder {
    pub(crate) fn new(column_names: Vec<String>) -> Self {
        let column_index = Arc::new(row::index_columns(&column_names));
        Self {
            column_names: Arc::new(column_names),
            column_index,
            records: Vec::new(),
        }
    }

    pub(crate) fn push_row(&mut self, values: Vec<RowValues>) {
        self.records.push(Record::Row(Row::with_index(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_index),
            values,
        )));
    }

    pub(crate) fn push_value(&mut self, value: RowValues) {
        self.records.push(Record::Value(value));
    }

    pub(crate) fn finish(self, affected: u64) -> QueryResult {
        QueryResult {
            affected,
            records: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_keep_column_order() {
        let mut builder = RecordBuilder::new(vec!["b".into(), "a".into()]);
        builder.push_row(vec![RowValues::Int(2), RowValues::Int(1)]);
        builder.push_value(RowValues::Int(9));
        let result = builder.finish(1);

        let row = result.records[0].as_row().unwrap();
        let pairs: Vec<_> = row.iter().map(|(c, v)| (c.to_string(), v.clone())).collect();
        assert_eq!(
            pairs,
            vec![
                ("b".to_string(), RowValues::Int(2)),
                ("a".to_string(), RowValues::Int(1))
            ]
        );
        assert_eq!(result.records[0].get("a"), Some(&RowValues::Int(1)));
        assert_eq!(result.records[1].as_value(), Some(&RowValues::Int(9)));
        assert_eq!(result.raw().len(), 2);
        assert_eq!(result.rows().count(), 1);
    }
}
