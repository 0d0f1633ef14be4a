//! Prelude for convenient imports.
//!
//! ```ignore
//! use kiln_core::prelude::*;
//! ```

// Core types
pub use crate::types::{
    ConnectionId, ExecutionId, ModuleId, PersistentConnectionId, PersistentId,
};
pub use crate::value::Value;

// Error handling
pub use crate::error::{ComputeError, ComputeResultExt, KilnError, Result};

// Pipelines
pub use crate::graph::Dag;
pub use crate::pipeline::{
    ConnectionDescriptor, Function, LoadedPipeline, ModuleDescriptor, ModuleKey, Pipeline,
    PipelineDefinition,
};
pub use crate::signature::{Signature, SignatureIndex, Topology};

// Traits
pub use crate::traits::{
    ComputeContext, FnFactory, Module, ModuleFactory, ModuleInfo, ModuleRegistry, Port,
    PortDirection, PortType, Registry,
};

// Logging
pub use crate::logging::{
    BufferedCollector, LogCategory, LogCollector, LogContext, LogEvent, LogFilter, LogLevel,
};
