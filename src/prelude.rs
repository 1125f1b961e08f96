//! Convenient imports for common functionality.
//!
//! This module re-exports the types most callers need to build a driver,
//! run queries and read their results.

pub use crate::api::{SqliteApi, factory};
pub use crate::config::{DriverSettings, EmbeddedOptions, EmbeddedOptionsBuilder};
pub use crate::driver::{ConnectionState, EmbeddedDriver};
pub use crate::error::{BackendError, DriverError};
pub use crate::logger::{QueryLogger, TracingLogger};
pub use crate::module::{BackendModule, ModuleProvider};
pub use crate::results::{QueryResult, Record, Row};
pub use crate::runner::QueryRunner;
pub use crate::types::{ModuleVariant, ReplicationMode, RowValues};

pub use rusqlite::OpenFlags;
