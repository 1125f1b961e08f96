//! Connection lifecycle for one embedded database.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::SqliteApi;
use crate::config::EmbeddedOptions;
use crate::engine::DbHandle;
use crate::error::DriverError;
use crate::factory::BackendFactory;
use crate::runner::QueryRunner;
use crate::types::ReplicationMode;

/// Where a driver is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected, or the last connect attempt failed
    Uninitialized,
    /// Waiting for the backend or opening the database
    Connecting,
    /// Open, with the handle of the database
    Connected(DbHandle),
    /// Closed by [`EmbeddedDriver::disconnect`]
    Disconnected,
}

/// State shared between a driver and its query runner.
pub(crate) struct DriverCore {
    options: EmbeddedOptions,
    factory: BackendFactory,
    state: Mutex<ConnectionState>,
}

impl DriverCore {
    pub(crate) fn options(&self) -> &EmbeddedOptions {
        &self.options
    }

    pub(crate) async fn api(&self) -> Result<Arc<dyn SqliteApi>, DriverError> {
        self.factory
            .api()
            .await
            .map_err(DriverError::BackendUnavailable)
    }

    fn state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn connection_handle(&self) -> Result<DbHandle, DriverError> {
        match *self.state() {
            ConnectionState::Connected(db) => Ok(db),
            other => Err(DriverError::connection(
                format!("driver is not connected (state: {other:?})"),
                None,
            )),
        }
    }
}

/// Driver for one embedded database connection.
///
/// The backend module loads in the background as soon as the driver is built;
/// [`EmbeddedDriver::connect`] waits for it before opening the database.
pub struct EmbeddedDriver {
    core: Arc<DriverCore>,
    runner: Mutex<Option<Arc<QueryRunner>>>,
}

impl EmbeddedDriver {
    /// Create a driver and start resolving its backend.
    ///
    /// # Arguments
    ///
    /// * `options` - Database path, open flags, VFS and backend source
    ///
    /// # Returns
    ///
    /// A driver in the `Uninitialized` state. The backend module begins loading
    /// right away; nothing is opened until [`EmbeddedDriver::connect`].
    #[must_use]
    pub fn new(options: EmbeddedOptions) -> Self {
        let factory = BackendFactory::new(options.backend_source(), &options.provider);
        Self {
            core: Arc::new(DriverCore {
                options,
                factory,
                state: Mutex::new(ConnectionState::Uninitialized),
            }),
            runner: Mutex::new(None),
        }
    }

    /// Options the driver was built with.
    #[must_use]
    pub fn options(&self) -> &EmbeddedOptions {
        &self.core.options
    }

    /// The backend factory.
    ///
    /// # Returns
    ///
    /// The factory whose shared future resolves the backend for this driver;
    /// awaiting [`BackendFactory::ready`] waits for the module to finish loading.
    #[must_use]
    pub fn factory(&self) -> &BackendFactory {
        &self.core.factory
    }

    /// Snapshot of the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.core.state()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self.state(), ConnectionState::Connected(_))
    }

    /// Handle of the open database.
    ///
    /// # Returns
    ///
    /// The handle held by `ConnectionState::Connected`
    ///
    /// # Errors
    /// Returns `DriverError::ConnectionError` when the driver is not connected.
    pub fn connection_handle(&self) -> Result<DbHandle, DriverError> {
        self.core.connection_handle()
    }

    /// Wait for the backend, open the database and enable foreign keys.
    ///
    /// A failed attempt leaves the driver `Uninitialized` so it can be retried.
    ///
    /// # Errors
    /// Returns `DriverError::ConnectionError` when the backend failed to load,
    /// the database cannot be opened, or the driver is already connected.
    pub async fn connect(&self) -> Result<(), DriverError> {
        {
            let mut state = self.core.state();
            match *state {
                ConnectionState::Uninitialized | ConnectionState::Disconnected => {
                    *state = ConnectionState::Connecting;
                }
                other => {
                    return Err(DriverError::connection(
                        format!("cannot connect while {other:?}"),
                        None,
                    ));
                }
            }
        }

        match self.open().await {
            Ok(db) => {
                *self.core.state() = ConnectionState::Connected(db);
                tracing::debug!(database = %self.core.options.database, %db, "connected");
                Ok(())
            }
            Err(err) => {
                *self.core.state() = ConnectionState::Uninitialized;
                Err(err)
            }
        }
    }

    async fn open(&self) -> Result<DbHandle, DriverError> {
        let opts = &self.core.options;
        let api = self.core.factory.api().await.map_err(|err| {
            DriverError::connection("sqlite backend failed to load", Some(err))
        })?;
        let db = api
            .open_v2(&opts.database, opts.flags, opts.vfs.as_deref())
            .await
            .map_err(|err| {
                DriverError::connection(format!("cannot open {}", opts.database), Some(err))
            })?;
        if let Err(err) = api.exec(db, "PRAGMA foreign_keys = ON").await {
            if let Err(close_err) = api.close(db).await {
                tracing::debug!(error = %close_err, %db, "close after failed pragma");
            }
            return Err(DriverError::connection(
                "cannot enable foreign keys",
                Some(err),
            ));
        }
        Ok(db)
    }

    /// Release the query runner and close the database.
    ///
    /// # Errors
    /// Returns `DriverError::ConnectionError` when the driver is not connected or
    /// closing fails.
    pub async fn disconnect(&self) -> Result<(), DriverError> {
        let db = self.core.connection_handle()?;
        let runner = self
            .runner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runner) = runner {
            runner.release();
        }

        let api = self.core.factory.api().await.map_err(|err| {
            DriverError::connection("sqlite backend failed to load", Some(err))
        })?;
        api.close(db)
            .await
            .map_err(|err| DriverError::connection("cannot close database", Some(err)))?;
        *self.core.state() = ConnectionState::Disconnected;
        tracing::debug!(database = %self.core.options.database, %db, "disconnected");
        Ok(())
    }

    /// The runner for this connection, created on first use.
    ///
    /// # Arguments
    ///
    /// * `mode` - Replica hint; the engine has a single connection, so it has no effect
    ///
    /// # Returns
    ///
    /// The same runner for every call until [`EmbeddedDriver::disconnect`] releases it
    #[must_use]
    pub fn create_query_runner(&self, mode: ReplicationMode) -> Arc<QueryRunner> {
        let mut slot = self.runner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(runner) = slot.as_ref() {
            return Arc::clone(runner);
        }
        tracing::trace!(?mode, "creating query runner");
        let runner = Arc::new(QueryRunner::new(Arc::clone(&self.core)));
        *slot = Some(Arc::clone(&runner));
        runner
    }
}

impl fmt::Debug for EmbeddedDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedDriver")
            .field("options", &self.core.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
