//! Query logging hooks.

use std::error::Error;
use std::time::Duration;

use crate::types::RowValues;

/// Receives query lifecycle events from a [`crate::runner::QueryRunner`].
///
/// The runner only emits events; formatting and storage are up to the implementation.
pub trait QueryLogger: Send + Sync {
    /// A query is about to run.
    fn log_query(&self, query: &str, parameters: &[RowValues]);

    /// A query exceeded the configured slow-query threshold.
    fn log_query_slow(&self, elapsed: Duration, query: &str, parameters: &[RowValues]);

    /// A query failed.
    fn log_query_error(&self, error: &(dyn Error + 'static), query: &str, parameters: &[RowValues]);
}

/// Default logger, forwarding events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl QueryLogger for TracingLogger {
    fn log_query(&self, query: &str, parameters: &[RowValues]) {
        tracing::debug!(target: "embedded_sql_driver::query", query, ?parameters, "query");
    }

    fn log_query_slow(&self, elapsed: Duration, query: &str, parameters: &[RowValues]) {
        tracing::warn!(
            target: "embedded_sql_driver::query",
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            query,
            ?parameters,
            "query is slow"
        );
    }

    fn log_query_error(&self, error: &(dyn Error + 'static), query: &str, parameters: &[RowValues]) {
        tracing::error!(
            target: "embedded_sql_driver::query",
            error = %error,
            query,
            ?parameters,
            "query failed"
        );
    }
}
