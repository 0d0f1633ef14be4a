//! Kiln Core Library
//!
//! Foundational types and traits for the Kiln cached pipeline engine.
//!
//! # Key Components
//!
//! - **Pipeline**: ephemeral DAG of module descriptors addressed by local ids
//! - **Signature**: content hash of a module and everything upstream of it
//! - **Module / ModuleRegistry**: the computation contract and its lookup
//! - **Logging**: correlation-aware event collection
//!
//! # Example
//!
//! ```ignore
//! use kiln_core::prelude::*;
//!
//! let mut pipeline = Pipeline::new();
//! let m = pipeline.add_module(
//!     ModuleDescriptor::new(ModuleKey::new("kiln.basic", "IntegerSource")).with_param("value", 1),
//! );
//! let n = pipeline.add_module(
//!     ModuleDescriptor::new(ModuleKey::new("kiln.basic", "Add")).with_param("b", 1),
//! );
//! pipeline.connect(m, "value", n, "a")?;
//!
//! let mut index = SignatureIndex::new(&pipeline);
//! let signature = index.subpipeline_signature(n)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod graph;
pub mod logging;
pub mod pipeline;
pub mod prelude;
pub mod signature;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{ComputeError, KilnError, Result};
pub use pipeline::{ConnectionDescriptor, Function, ModuleDescriptor, ModuleKey, Pipeline};
pub use signature::{Signature, SignatureIndex};
pub use traits::{ComputeContext, Module, ModuleFactory, ModuleInfo, ModuleRegistry, Registry};
pub use types::{ConnectionId, ExecutionId, ModuleId, PersistentId};
pub use value::Value;
