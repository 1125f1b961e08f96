use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// One row returned by a statement.
///
/// Column names are shared by all rows of one query and keep the order the
/// statement reported them in.
#[derive(Debug, Clone)]
pub struct Row {
    column_names: Arc<Vec<String>>,
    values: Vec<RowValues>,
    column_index: Arc<HashMap<String, usize>>,
}

impl Row {
    /// Build a row; `column_index` must be derived from `column_names`.
    pub(crate) fn with_index(
        column_names: Arc<Vec<String>>,
        column_index: Arc<HashMap<String, usize>>,
        values: Vec<RowValues>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index,
        }
    }

    /// Create a row and index its columns.
    ///
    /// # Arguments
    ///
    /// * `column_names` - The column names, in statement order
    /// * `values` - The values for this row, one per column
    ///
    /// # Returns
    ///
    /// A new `Row` whose name lookups go through a freshly built index
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self::with_index(column_names, column_index, values)
    }

    /// Column names in the order the statement reported them.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Values in column order.
    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    /// Get a value from the row by column name
    ///
    /// With duplicate names the last one wins, matching what an object keyed by
    /// column name would hold.
    ///
    /// # Arguments
    ///
    /// * `column_name` - The name of the column
    ///
    /// # Returns
    ///
    /// The value at the column, or `None` if the column wasn't found
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.column_index
            .get(column_name)
            .and_then(|&idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    ///
    /// # Arguments
    ///
    /// * `index` - The zero-based index of the column
    ///
    /// # Returns
    ///
    /// The value at the index, or `None` if the index is out of bounds
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    /// `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub(crate) fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}
