use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, OnceLock};

use crate::types::ModuleVariant;

use super::{LoadedModule, load_module};

/// Function used to load a module the first time a variant is requested.
pub type ModuleLoader = Box<dyn Fn(ModuleVariant) -> LoadedModule + Send + Sync>;

static GLOBAL_PROVIDER: LazyLock<Arc<ModuleProvider>> =
    LazyLock::new(|| Arc::new(ModuleProvider::new()));

/// Caches one loaded module per variant.
///
/// The first request for a variant runs the loader; every later (or concurrent)
/// request gets the same module and readiness signal back.
pub struct ModuleProvider {
    loader: ModuleLoader,
    sync_slot: OnceLock<LoadedModule>,
    async_slot: OnceLock<LoadedModule>,
    sync_loads: AtomicUsize,
    async_loads: AtomicUsize,
}

impl ModuleProvider {
    /// Provider backed by the real engine loader.
    #[must_use]
    pub fn new() -> Self {
        Self::with_loader(Box::new(load_module))
    }

    /// Provider backed by a custom loader.
    #[must_use]
    pub fn with_loader(loader: ModuleLoader) -> Self {
        Self {
            loader,
            sync_slot: OnceLock::new(),
            async_slot: OnceLock::new(),
            sync_loads: AtomicUsize::new(0),
            async_loads: AtomicUsize::new(0),
        }
    }

    /// The process-wide provider.
    #[must_use]
    pub fn global() -> Arc<ModuleProvider> {
        Arc::clone(&GLOBAL_PROVIDER)
    }

    fn slot(&self, variant: ModuleVariant) -> (&OnceLock<LoadedModule>, &AtomicUsize) {
        match variant {
            ModuleVariant::Sync => (&self.sync_slot, &self.sync_loads),
            ModuleVariant::Async => (&self.async_slot, &self.async_loads),
        }
    }

    /// Get (loading on first use) the module for `variant`.
    #[must_use]
    pub fn get_module(&self, variant: ModuleVariant) -> LoadedModule {
        let (slot, loads) = self.slot(variant);
        slot.get_or_init(|| {
            loads.fetch_add(1, Ordering::SeqCst);
            (self.loader)(variant)
        })
        .clone()
    }

    /// How many times the loader ran for `variant` (0 or 1).
    #[must_use]
    pub fn load_count(&self, variant: ModuleVariant) -> usize {
        self.slot(variant).1.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_loaded(&self, variant: ModuleVariant) -> bool {
        self.slot(variant).0.get().is_some()
    }
}

impl Default for ModuleProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleProvider")
            .field("sync_loaded", &self.is_loaded(ModuleVariant::Sync))
            .field("async_loaded", &self.is_loaded(ModuleVariant::Async))
            .finish_non_exhaustive()
    }
}
