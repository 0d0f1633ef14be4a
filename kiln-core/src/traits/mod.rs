//! Core traits for Kiln components.
//!
//! - `Module`: the unit of computation held by the cache
//! - `ModuleFactory` / `ModuleRegistry`: key-to-implementation resolution

mod module;
mod registry;

pub use module::{ComputeContext, Module, ModuleInfo, Port, PortDirection, PortType};
pub use registry::{FnFactory, ModuleFactory, ModuleRegistry, Registry};
