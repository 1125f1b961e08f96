//! Async driver for an embedded, in-process `SQLite` engine.
//!
//! The engine is loaded as a backend module (inline or on a worker thread),
//! shared per process, and driven through raw statement handles:
//!
//! ```no_run
//! use embedded_sql_driver::prelude::*;
//!
//! # async fn demo() -> Result<(), DriverError> {
//! let driver = EmbeddedOptionsBuilder::new(":memory:").build();
//! driver.connect().await?;
//! let runner = driver.create_query_runner(ReplicationMode::Master);
//! runner.query("CREATE TABLE t (x INTEGER)", &[]).await?;
//! let records = runner
//!     .query("INSERT INTO t (x) VALUES (?)", &[Some(RowValues::Int(5))])
//!     .await?;
//! let id = records.last().and_then(Record::as_value);
//! # let _ = id;
//! driver.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod conversion;
pub mod driver;
pub mod engine;
pub mod error;
pub mod factory;
pub mod logger;
pub mod module;
pub mod prelude;
pub mod results;
pub mod runner;
pub mod types;

pub use api::{ModuleApi, SqliteApi};
pub use config::{DriverSettings, EmbeddedOptions, EmbeddedOptionsBuilder};
pub use driver::{ConnectionState, EmbeddedDriver};
pub use error::{BackendError, DriverError};
pub use factory::{BackendFactory, BackendSource};
pub use logger::{QueryLogger, TracingLogger};
pub use module::{BackendModule, ModuleProvider};
pub use results::{QueryResult, Record, Row};
pub use runner::QueryRunner;
pub use types::{ModuleVariant, ReplicationMode, RowValues};

pub use rusqlite::OpenFlags;
