//! Stage module loading.
//!
//! Stage modules are compiled as dynamic libraries and shipped with the
//! job. Loading resolves one fixed registration symbol and lets the module
//! populate the host's entry registry; the host never resolves stage
//! symbols by name. Loaded libraries are cached and kept alive for the
//! process lifetime, since registered function pointers live inside them.

use crate::bridge::EntryRegistry;
use crate::{Result, VertexError};
use dashmap::DashMap;
use libloading::Library;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Fixed symbol every stage module exports.
pub const REGISTER_SYMBOL: &[u8] = b"skein_register_entries";

/// Registration hook exported by stage modules.
///
/// Stage modules are built by the same toolchain as the host; the call
/// crosses the library boundary with a single opaque registry pointer.
pub type RegisterEntriesFn = unsafe extern "C" fn(*const EntryRegistry);

/// A loaded stage module.
pub struct StageModule {
    _library: Library,
}

impl std::fmt::Debug for StageModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageModule").finish_non_exhaustive()
    }
}

impl StageModule {
    /// Load a stage module and let it register its entry points.
    pub fn load(path: &Path, registry: &EntryRegistry) -> Result<Self> {
        info!(path = %path.display(), "loading stage module");

        let module_load = |source| VertexError::ModuleLoad {
            path: path.display().to_string(),
            source,
        };

        // Safety: loading shared libraries is inherently unsafe
        let library = unsafe { Library::new(path) }.map_err(module_load)?;

        let register: RegisterEntriesFn = unsafe {
            *library
                .get::<RegisterEntriesFn>(REGISTER_SYMBOL)
                .map_err(module_load)?
        };
        unsafe { register(registry as *const EntryRegistry) };

        info!(path = %path.display(), entries = registry.len(), "stage module registered");

        Ok(Self { _library: library })
    }
}

/// Cache of loaded stage modules, keyed by path.
#[derive(Default)]
pub struct StageModuleCache {
    modules: DashMap<String, Arc<StageModule>>,
}

impl StageModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a module unless it is already resident.
    pub fn get_or_load(
        &self,
        path: &Path,
        registry: &EntryRegistry,
    ) -> Result<Arc<StageModule>> {
        let key = path.display().to_string();
        if let Some(module) = self.modules.get(&key) {
            return Ok(module.clone());
        }

        let module = Arc::new(StageModule::load(path, registry)?);
        self.modules.insert(key, module.clone());
        Ok(module)
    }
}
