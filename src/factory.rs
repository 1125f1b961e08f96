//! Resolves the configured backend source into a single shared backend future.

use std::fmt;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::api::{SqliteApi, factory};
use crate::error::BackendError;
use crate::module::{BackendModule, ModuleProvider, Readiness};
use crate::types::ModuleVariant;

/// Where a driver gets its backend instance from.
#[derive(Clone)]
pub enum BackendSource {
    /// A fully built backend instance supplied by the caller.
    Supplied(Arc<dyn SqliteApi>),
    /// A module supplied by the caller; assumed to be ready.
    SuppliedModule(Arc<dyn BackendModule>),
    /// Load (or reuse) the process-wide module of this variant.
    LoadVariant(ModuleVariant),
}

impl fmt::Debug for BackendSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendSource::Supplied(_) => f.write_str("Supplied"),
            BackendSource::SuppliedModule(module) => f
                .debug_tuple("SuppliedModule")
                .field(&module.variant())
                .finish(),
            BackendSource::LoadVariant(variant) => {
                f.debug_tuple("LoadVariant").field(variant).finish()
            }
        }
    }
}

type ApiResult = Result<Arc<dyn SqliteApi>, BackendError>;
type ApiFuture = Shared<BoxFuture<'static, ApiResult>>;

/// Memoized backend for one driver.
///
/// Exactly one future exists per factory; every caller awaiting [`BackendFactory::api`]
/// before the backend is ready waits on that same future, so initialization runs once
/// and a failure is reported to every awaiter.
#[derive(Clone)]
pub struct BackendFactory {
    source: BackendSource,
    ready: Readiness,
    api: ApiFuture,
}

impl BackendFactory {
    #[must_use]
    pub fn new(source: BackendSource, provider: &ModuleProvider) -> Self {
        let (ready, api): (Readiness, BoxFuture<'static, ApiResult>) = match &source {
            BackendSource::Supplied(api) => {
                let api = Arc::clone(api);
                (Readiness::resolved(), async move { Ok(api) }.boxed())
            }
            BackendSource::SuppliedModule(module) => {
                let module = Arc::clone(module);
                (Readiness::resolved(), async move { Ok(factory(module)) }.boxed())
            }
            BackendSource::LoadVariant(variant) => {
                let loaded = provider.get_module(*variant);
                let ready = loaded.ready.clone();
                let api = async move {
                    loaded.ready.wait().await?;
                    Ok::<_, BackendError>(factory(loaded.module))
                }
                .boxed();
                (ready, api)
            }
        };
        Self {
            source,
            ready,
            api: api.shared(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &BackendSource {
        &self.source
    }

    /// Wait until the underlying module finished loading.
    ///
    /// # Errors
    /// Returns the module's startup failure.
    pub async fn ready(&self) -> Result<(), BackendError> {
        self.ready.wait().await
    }

    /// The backend instance, once ready.
    ///
    /// # Errors
    /// Returns the module's startup failure.
    pub async fn api(&self) -> Result<Arc<dyn SqliteApi>, BackendError> {
        self.api.clone().await
    }
}

impl fmt::Debug for BackendFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendFactory")
            .field("source", &self.source)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}
