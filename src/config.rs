use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::OpenFlags;
use serde::{Deserialize, Serialize};

use crate::api::SqliteApi;
use crate::driver::EmbeddedDriver;
use crate::error::DriverError;
use crate::factory::BackendSource;
use crate::logger::{QueryLogger, TracingLogger};
use crate::module::{BackendModule, ModuleProvider};
use crate::types::ModuleVariant;

/// Options for an [`EmbeddedDriver`].
#[derive(Clone)]
pub struct EmbeddedOptions {
    /// Database file name (or `:memory:`)
    pub database: String,
    /// Flags handed to the native open call
    pub flags: OpenFlags,
    /// Virtual filesystem to open the database with
    pub vfs: Option<String>,
    /// Module build to load when neither `module` nor `driver` is set
    pub variant: ModuleVariant,
    /// Pre-loaded module; takes precedence over `variant`
    pub module: Option<Arc<dyn BackendModule>>,
    /// Fully built backend instance; takes precedence over `module` and `variant`
    pub driver: Option<Arc<dyn SqliteApi>>,
    /// Queries slower than this are reported through [`QueryLogger::log_query_slow`]
    pub max_query_execution_time: Option<Duration>,
    pub logger: Arc<dyn QueryLogger>,
    /// Module cache used to resolve `variant`
    pub provider: Arc<ModuleProvider>,
}

impl EmbeddedOptions {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            flags: OpenFlags::default(),
            vfs: None,
            variant: ModuleVariant::default(),
            module: None,
            driver: None,
            max_query_execution_time: None,
            logger: Arc::new(TracingLogger),
            provider: ModuleProvider::global(),
        }
    }

    /// Options from serializable settings; everything else keeps its default.
    ///
    /// # Errors
    /// Returns `DriverError::ConfigError` when `flags` holds unknown bits.
    pub fn from_settings(settings: &DriverSettings) -> Result<Self, DriverError> {
        let mut opts = Self::new(settings.database.clone());
        if let Some(bits) = settings.flags {
            opts.flags = OpenFlags::from_bits(bits).ok_or_else(|| {
                DriverError::ConfigError(format!("unknown open flag bits: {bits:#x}"))
            })?;
        }
        opts.vfs.clone_from(&settings.vfs);
        opts.variant = settings.variant;
        opts.max_query_execution_time = settings
            .max_query_execution_time_ms
            .map(Duration::from_millis);
        Ok(opts)
    }

    /// Resolve where the backend comes from: `driver`, then `module`, then `variant`.
    #[must_use]
    pub fn backend_source(&self) -> BackendSource {
        if let Some(driver) = &self.driver {
            BackendSource::Supplied(Arc::clone(driver))
        } else if let Some(module) = &self.module {
            BackendSource::SuppliedModule(Arc::clone(module))
        } else {
            BackendSource::LoadVariant(self.variant)
        }
    }
}

impl fmt::Debug for EmbeddedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedOptions")
            .field("database", &self.database)
            .field("flags", &self.flags)
            .field("vfs", &self.vfs)
            .field("variant", &self.variant)
            .field("module", &self.module.is_some())
            .field("driver", &self.driver.is_some())
            .field("max_query_execution_time", &self.max_query_execution_time)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`EmbeddedOptions`].
#[derive(Debug, Clone)]
pub struct EmbeddedOptionsBuilder {
    opts: EmbeddedOptions,
}

impl EmbeddedOptionsBuilder {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            opts: EmbeddedOptions::new(database),
        }
    }

    #[must_use]
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.opts.flags = flags;
        self
    }

    #[must_use]
    pub fn vfs(mut self, vfs: impl Into<String>) -> Self {
        self.opts.vfs = Some(vfs.into());
        self
    }

    #[must_use]
    pub fn variant(mut self, variant: ModuleVariant) -> Self {
        self.opts.variant = variant;
        self
    }

    #[must_use]
    pub fn module(mut self, module: Arc<dyn BackendModule>) -> Self {
        self.opts.module = Some(module);
        self
    }

    #[must_use]
    pub fn driver(mut self, driver: Arc<dyn SqliteApi>) -> Self {
        self.opts.driver = Some(driver);
        self
    }

    #[must_use]
    pub fn max_query_execution_time(mut self, threshold: Duration) -> Self {
        self.opts.max_query_execution_time = Some(threshold);
        self
    }

    #[must_use]
    pub fn logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.opts.logger = logger;
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<ModuleProvider>) -> Self {
        self.opts.provider = provider;
        self
    }

    #[must_use]
    pub fn finish(self) -> EmbeddedOptions {
        self.opts
    }

    /// Build the driver. It still has to be connected.
    #[must_use]
    pub fn build(self) -> EmbeddedDriver {
        EmbeddedDriver::new(self.finish())
    }
}

/// Serializable driver settings, e.g. from a JSON config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSettings {
    pub database: String,
    /// Raw `SQLITE_OPEN_*` bits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vfs: Option<String>,
    #[serde(default)]
    pub variant: ModuleVariant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_query_execution_time_ms: Option<u64>,
}

impl DriverSettings {
    /// Parse settings from JSON.
    ///
    /// # Errors
    /// Returns `DriverError::ConfigError` for malformed JSON or missing fields.
    pub fn from_json_str(json: &str) -> Result<Self, DriverError> {
        Ok(serde_json::from_str(json)?)
    }
}
