//! Error types for Kiln.
//!
//! Two families of errors exist:
//!
//! - [`KilnError`] is fatal to the operation that raised it. An unknown module,
//!   a malformed pipeline or a corrupted cache index aborts the whole
//!   `execute()` call before any module is computed.
//! - [`ComputeError`] is local to one module. It is captured by the
//!   interpreter, recorded against the failing module and never unwinds past
//!   the sink that requested it.

use crate::types::{ConnectionId, ModuleId, PersistentId};
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Kiln operations.
#[derive(Error, Debug)]
pub enum KilnError {
    // =========================================================================
    // Registry / Pipeline Errors (E100-E199)
    // =========================================================================
    /// No module implementation is registered under this key.
    #[error("E101: Unknown module '{key}'")]
    UnknownModule {
        /// Display form of the (package, namespace, name) triple.
        key: String,
    },

    /// A module id is not present in the pipeline.
    #[error("E102: Module {module_id} not found in pipeline")]
    ModuleNotFound {
        /// The missing local module id.
        module_id: ModuleId,
    },

    /// A connection id is not present in the pipeline.
    #[error("E103: Connection {connection_id} not found in pipeline")]
    ConnectionNotFound {
        /// The missing local connection id.
        connection_id: ConnectionId,
    },

    /// A port name is not declared by the module's registry entry.
    #[error("E104: Port '{port}' is not declared on module {module_id} ('{key}')")]
    InvalidPort {
        /// The local module id.
        module_id: ModuleId,
        /// Display form of the module key.
        key: String,
        /// The undeclared port name.
        port: String,
    },

    /// A function's parameters do not fit the declared port type signature.
    #[error("E105: Function '{function}' on module {module_id}: {cause}")]
    ParameterMismatch {
        /// The local module id.
        module_id: ModuleId,
        /// The function (input port) name.
        function: String,
        /// What did not match.
        cause: String,
    },

    /// An id was inserted twice into the same pipeline.
    #[error("E106: Duplicate {kind} id {id}")]
    DuplicateId {
        /// "module" or "connection".
        kind: &'static str,
        /// The duplicated raw id.
        id: u32,
    },

    // =========================================================================
    // Topology Errors (E200-E299)
    // =========================================================================
    /// The connection would make the pipeline cyclic.
    #[error("E201: Cycle detected involving modules: {modules:?}")]
    CycleDetected {
        /// Modules participating in the cycle.
        modules: Vec<ModuleId>,
    },

    /// A connection refers to something that cannot be connected.
    #[error("E202: Invalid connection from {source_module}.{source_port} to {destination}.{destination_port}: {cause}")]
    InvalidConnection {
        /// The source module.
        source_module: ModuleId,
        /// The source port.
        source_port: String,
        /// The destination module.
        destination: ModuleId,
        /// The destination port.
        destination_port: String,
        /// Reason the connection is invalid.
        cause: String,
    },

    // =========================================================================
    // Cache Errors (E300-E399)
    // =========================================================================
    /// The persistent signature index is no longer a bijection onto live ids.
    #[error("E301: Signature index corrupted: {cause}")]
    SignatureIndexCorrupted {
        /// Description of the inconsistency.
        cause: String,
    },

    /// A persistent id is not present in the cache.
    #[error("E302: Persistent module {persistent_id} not found")]
    PersistentModuleNotFound {
        /// The missing persistent id.
        persistent_id: PersistentId,
    },

    /// A module was removed while dependents were still cached.
    #[error("E303: Cannot remove {persistent_id}: dependents still present {dependents:?}")]
    RemoveWithDependents {
        /// The module whose removal was attempted.
        persistent_id: PersistentId,
        /// Dependents that are still present.
        dependents: Vec<PersistentId>,
    },

    // =========================================================================
    // Configuration Errors (E800-E899)
    // =========================================================================
    /// YAML parsing failed.
    #[error("E801: Failed to parse pipeline YAML{}: {cause}", path_suffix(.path))]
    YamlParse {
        /// The file being parsed, if any.
        path: Option<PathBuf>,
        /// Reason for the parse failure.
        cause: String,
    },

    /// Invalid configuration value.
    #[error("E802: Invalid configuration '{field}': {cause}")]
    ConfigValue {
        /// The configuration field with invalid value.
        field: String,
        /// Description of why the value is invalid.
        cause: String,
    },

    /// Serialization/deserialization error.
    #[error("E803: Serialization error: {0}")]
    Serialization(
        /// The serialization error message.
        String,
    ),

    // =========================================================================
    // I/O Errors (E900-E999)
    // =========================================================================
    /// File I/O error.
    #[error("E901: I/O error at {path}: {cause}")]
    Io {
        /// The path where the I/O error occurred.
        path: PathBuf,
        /// Description of the I/O error.
        cause: String,
    },
}

impl KilnError {
    /// Get the error code (e.g., "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownModule { .. } => "E101",
            Self::ModuleNotFound { .. } => "E102",
            Self::ConnectionNotFound { .. } => "E103",
            Self::InvalidPort { .. } => "E104",
            Self::ParameterMismatch { .. } => "E105",
            Self::DuplicateId { .. } => "E106",
            Self::CycleDetected { .. } => "E201",
            Self::InvalidConnection { .. } => "E202",
            Self::SignatureIndexCorrupted { .. } => "E301",
            Self::PersistentModuleNotFound { .. } => "E302",
            Self::RemoveWithDependents { .. } => "E303",
            Self::YamlParse { .. } => "E801",
            Self::ConfigValue { .. } => "E802",
            Self::Serialization(_) => "E803",
            Self::Io { .. } => "E901",
        }
    }

    /// Check if this error was caused by the pipeline or its configuration
    /// rather than by the engine's own state.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownModule { .. }
                | Self::ModuleNotFound { .. }
                | Self::ConnectionNotFound { .. }
                | Self::InvalidPort { .. }
                | Self::ParameterMismatch { .. }
                | Self::DuplicateId { .. }
                | Self::CycleDetected { .. }
                | Self::InvalidConnection { .. }
                | Self::YamlParse { .. }
                | Self::ConfigValue { .. }
        )
    }
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" at {}", p.display()))
        .unwrap_or_default()
}

/// Result type alias using `KilnError`.
pub type Result<T> = std::result::Result<T, KilnError>;

/// Error raised by a single module's `compute()`.
///
/// These never abort an execution; the interpreter records them per module
/// and keeps updating the remaining sinks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComputeError {
    /// The module reported a failure.
    #[error("{message}")]
    Failed {
        /// Failure description.
        message: String,
    },

    /// A required input port has no value.
    #[error("missing required input '{port}'")]
    MissingInput {
        /// The input port.
        port: String,
    },

    /// An input value has the wrong shape.
    #[error("input '{port}' expected {expected}, found {found}")]
    InvalidInput {
        /// The input port.
        port: String,
        /// Expected type description.
        expected: String,
        /// Actual value description.
        found: String,
    },

    /// The module wrote to a port it does not declare.
    #[error("output '{port}' is not declared")]
    UndeclaredOutput {
        /// The output port.
        port: String,
    },

    /// An upstream module failed, so this one could not be computed.
    #[error("upstream module {upstream} failed")]
    UpstreamFailed {
        /// The failing upstream module.
        upstream: PersistentId,
    },

    /// `compute()` panicked; the panic payload is carried as the message.
    #[error("module panicked: {message}")]
    Panicked {
        /// The panic message.
        message: String,
    },
}

impl ComputeError {
    /// Create a generic failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Create a missing-input error.
    pub fn missing_input(port: impl Into<String>) -> Self {
        Self::MissingInput { port: port.into() }
    }

    /// Whether this error was inherited from an upstream failure.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamFailed { .. })
    }
}

/// Extension trait for turning foreign errors into module failures.
pub trait ComputeResultExt<T> {
    /// Map any displayable error into [`ComputeError::Failed`].
    fn compute_context(self, context: &str) -> std::result::Result<T, ComputeError>;
}

impl<T, E: std::fmt::Display> ComputeResultExt<T> for std::result::Result<T, E> {
    fn compute_context(self, context: &str) -> std::result::Result<T, ComputeError> {
        self.map_err(|e| ComputeError::failed(format!("{context}: {e}")))
    }
}
