//! Kiln Executor - cached pipeline interpreter.
//!
//! This crate provides the execution side of Kiln:
//! - Persistent pipeline holding live modules keyed by content signature
//! - Parameter adapters turning descriptor functions into port values
//! - `CachedInterpreter`: merge, demand-driven updates, rollback
//! - `SharedInterpreter` for callers on several threads
//! - Interpreter configuration and tracing subscriber setup

#![warn(missing_docs)]

pub mod adapter;
pub mod cache;
pub mod config;
pub mod handle;
pub mod interpreter;
pub mod observability;

pub use cache::{Connector, LiveModule, PersistentConnection, PersistentPipeline};
pub use config::InterpreterConfig;
pub use handle::SharedInterpreter;
pub use interpreter::{
    CachedInterpreter, ExecuteOptions, ExecutionHook, ExecutionResult, MergeOutcome, ModuleDone,
    ModuleError, ModuleHandle,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cache::{Connector, LiveModule, PersistentPipeline};
    pub use crate::config::InterpreterConfig;
    pub use crate::handle::SharedInterpreter;
    pub use crate::interpreter::{
        CachedInterpreter, ExecuteOptions, ExecutionHook, ExecutionResult, MergeOutcome,
        ModuleDone, ModuleError, ModuleHandle,
    };
    pub use crate::observability::{LogFormat, TracingConfig, init_tracing};
}
