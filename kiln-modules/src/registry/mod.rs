//! Module metadata and the standard registry.
//!
//! Every standard module declares its ports through [`ModuleMetadata`].
//! [`create_standard_library`] registers each one with a factory and keeps a
//! catalog entry for introspection (`kiln modules`).

use crate::PACKAGE;
use kiln_core::pipeline::ModuleKey;
use kiln_core::traits::{Module, ModuleInfo, Registry};
use serde::Serialize;

/// Module category for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleCategory {
    /// Parameter-fed sources.
    Source,
    /// Numeric operations.
    Arithmetic,
    /// Value shaping (concatenation, tuples, aggregation).
    Data,
    /// Pass-through and control modules.
    Flow,
    /// Modules with external side effects.
    Sink,
}

/// Trait for modules to declare their registry metadata.
///
/// # Example
///
/// ```ignore
/// use kiln_modules::registry::{ModuleCategory, ModuleMetadata};
///
/// #[derive(Default)]
/// struct Negate;
///
/// impl ModuleMetadata for Negate {
///     fn metadata() -> ModuleInfo {
///         ModuleInfo::new("kiln.basic", "Negate")
///             .with_inputs(vec![Port::input("value", PortType::Float)])
///             .with_outputs(vec![Port::output("value", PortType::Float)])
///     }
///
///     fn category() -> ModuleCategory {
///         ModuleCategory::Arithmetic
///     }
/// }
/// ```
pub trait ModuleMetadata {
    /// Key and declared ports of this module type.
    fn metadata() -> ModuleInfo;

    /// Catalog category.
    fn category() -> ModuleCategory;
}

/// One catalog row.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    /// Catalog category.
    pub category: ModuleCategory,
    /// Module metadata.
    pub info: ModuleInfo,
}

/// Registry plus the catalog of what was registered into it.
#[derive(Debug, Default)]
pub struct StandardLibrary {
    registry: Registry,
    catalog: Vec<CatalogEntry>,
}

impl StandardLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module type using its metadata and `Default` constructor.
    pub fn register<T>(&mut self)
    where
        T: ModuleMetadata + Module + Default + 'static,
    {
        let info = T::metadata();
        self.catalog.push(CatalogEntry {
            category: T::category(),
            info: info.clone(),
        });
        self.registry.register_fn(info, || Box::new(T::default()));
    }

    /// Catalog entries, sorted by category then name.
    pub fn catalog(&self) -> Vec<&CatalogEntry> {
        let mut entries: Vec<&CatalogEntry> = self.catalog.iter().collect();
        entries.sort_by(|a, b| {
            (a.category, &a.info.key.name).cmp(&(b.category, &b.info.key.name))
        });
        entries
    }

    /// Metadata for one module key.
    pub fn get(&self, key: &ModuleKey) -> Option<&CatalogEntry> {
        self.catalog.iter().find(|entry| &entry.info.key == key)
    }

    /// Borrow the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Take the registry, dropping the catalog.
    pub fn into_registry(self) -> Registry {
        self.registry
    }
}

/// Create and populate the standard library.
pub fn create_standard_library() -> StandardLibrary {
    let mut library = StandardLibrary::new();

    // Sources
    library.register::<crate::source::IntegerSource>();
    library.register::<crate::source::FloatSource>();
    library.register::<crate::source::StringSource>();

    // Arithmetic
    library.register::<crate::arithmetic::Add>();
    library.register::<crate::arithmetic::Multiply>();

    // Data
    library.register::<crate::data::Sum>();
    library.register::<crate::data::Concat>();
    library.register::<crate::data::Pair>();

    // Flow
    library.register::<crate::flow::Identity>();
    library.register::<crate::flow::Fail>();

    // Sinks
    library.register::<crate::sink::FileSink>();

    tracing::debug!(
        package = PACKAGE,
        modules = library.catalog.len(),
        "Standard library registered"
    );

    library
}

/// Registry with every `kiln.basic` module.
pub fn standard_registry() -> Registry {
    create_standard_library().into_registry()
}
