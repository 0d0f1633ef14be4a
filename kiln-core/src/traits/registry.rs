//! Module registry: the single dynamic-dispatch boundary.
//!
//! A pipeline names its modules by [`ModuleKey`]. The registry resolves a key
//! to a [`ModuleFactory`] once per merge; everything after that works on
//! concrete `Box<dyn Module>` instances.

use super::module::{Module, ModuleInfo};
use crate::error::{KilnError, Result};
use crate::pipeline::ModuleKey;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Creates module instances of one type.
pub trait ModuleFactory: Send + Sync {
    /// Declared ports of the module type.
    fn info(&self) -> &ModuleInfo;

    /// Create a fresh, unbuilt instance.
    fn create(&self) -> Box<dyn Module>;
}

/// Factory built from a constructor closure.
pub struct FnFactory<F> {
    info: ModuleInfo,
    create: F,
}

impl<F> FnFactory<F>
where
    F: Fn() -> Box<dyn Module> + Send + Sync,
{
    /// Create a factory.
    pub fn new(info: ModuleInfo, create: F) -> Self {
        Self { info, create }
    }
}

impl<F> ModuleFactory for FnFactory<F>
where
    F: Fn() -> Box<dyn Module> + Send + Sync,
{
    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn create(&self) -> Box<dyn Module> {
        (self.create)()
    }
}

/// Resolves module keys to factories.
pub trait ModuleRegistry: Send + Sync {
    /// Look up the factory for `key`.
    ///
    /// Fails with [`KilnError::UnknownModule`] when nothing is registered.
    fn resolve(&self, key: &ModuleKey) -> Result<Arc<dyn ModuleFactory>>;

    /// Declared input and output ports for `key`.
    fn declared_ports(&self, key: &ModuleKey) -> Result<ModuleInfo> {
        Ok(self.resolve(key)?.info().clone())
    }
}

impl<R: ModuleRegistry + ?Sized> ModuleRegistry for Arc<R> {
    fn resolve(&self, key: &ModuleKey) -> Result<Arc<dyn ModuleFactory>> {
        (**self).resolve(key)
    }
}

/// In-memory registry.
#[derive(Default)]
pub struct Registry {
    factories: RwLock<HashMap<ModuleKey, Arc<dyn ModuleFactory>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under the key in its info. Returns the factory it
    /// replaced, if any.
    pub fn register(&self, factory: Arc<dyn ModuleFactory>) -> Option<Arc<dyn ModuleFactory>> {
        let key = factory.info().key.clone();
        tracing::debug!(module = %key, "Registered module");
        self.factories.write().insert(key, factory)
    }

    /// Register a constructor closure.
    pub fn register_fn<F>(&self, info: ModuleInfo, create: F) -> Option<Arc<dyn ModuleFactory>>
    where
        F: Fn() -> Box<dyn Module> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnFactory::new(info, create)))
    }

    /// Check whether a key is registered.
    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.factories.read().contains_key(key)
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<ModuleKey> {
        let mut keys: Vec<ModuleKey> = self.factories.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered module types.
    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl ModuleRegistry for Registry {
    fn resolve(&self, key: &ModuleKey) -> Result<Arc<dyn ModuleFactory>> {
        self.factories
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| KilnError::UnknownModule {
                key: key.to_string(),
            })
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("modules", &self.keys())
            .finish()
    }
}
