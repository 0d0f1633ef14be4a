//! Options and results of one `execute()` call.

use super::hooks::ExecutionHook;
use kiln_core::error::ComputeError;
use kiln_core::signature::Signature;
use kiln_core::types::{ConnectionId, ExecutionId, ModuleId, PersistentId};
use kiln_core::value::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Per-call options.
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    /// Audit label attached to modules created by this call.
    pub reason: Option<String>,
    /// Substitutes result keys, e.g. when the pipeline was expanded from a
    /// nested one and results must be reported under the outer ids.
    pub module_remap: HashMap<ModuleId, ModuleId>,
    /// Observers for this call.
    pub hooks: Vec<Arc<dyn ExecutionHook>>,
}

impl ExecuteOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Report results for `from` under `to`.
    pub fn with_remap(mut self, from: ModuleId, to: ModuleId) -> Self {
        self.module_remap.insert(from, to);
        self
    }

    /// Add a hook.
    pub fn with_hook(mut self, hook: Arc<dyn ExecutionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub(crate) fn remap(&self, id: ModuleId) -> ModuleId {
        self.module_remap.get(&id).copied().unwrap_or(id)
    }
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("reason", &self.reason)
            .field("module_remap", &self.module_remap)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Snapshot of one cached module as seen at the end of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleHandle {
    /// Cache entry the caller's module resolved to.
    pub persistent_id: PersistentId,
    /// Subpipeline signature of that entry.
    pub signature: Signature,
    /// Output values, copied out of the cache.
    pub outputs: BTreeMap<String, Value>,
}

impl ModuleHandle {
    /// One output value.
    pub fn output(&self, port: &str) -> Option<&Value> {
        self.outputs.get(port)
    }
}

/// A module that ended the call in an error state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{key} ({persistent_id}): {error}")]
pub struct ModuleError {
    /// Cache entry that failed.
    pub persistent_id: PersistentId,
    /// Registry key, for messages.
    pub key: String,
    /// What went wrong.
    pub error: ComputeError,
}

/// Outcome of one `execute()` call, keyed by caller module id.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Correlation id of the call.
    pub execution_id: ExecutionId,
    /// Handles for every module of the pipeline.
    pub objects: BTreeMap<ModuleId, ModuleHandle>,
    /// Modules that failed, including ones whose upstream failed.
    pub errors: BTreeMap<ModuleId, ModuleError>,
    /// Whether `compute()` ran for the module during this call.
    pub executed: BTreeMap<ModuleId, bool>,
    /// Modules that created a new cache entry.
    pub modules_added: BTreeSet<ModuleId>,
    /// Connections that created a new cache entry.
    pub connections_added: BTreeSet<ConnectionId>,
}

impl ExecutionResult {
    /// Whether no module failed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Output value of a module.
    pub fn output(&self, module: ModuleId, port: &str) -> Option<&Value> {
        self.objects.get(&module).and_then(|h| h.output(port))
    }

    /// Error of a module.
    pub fn error(&self, module: ModuleId) -> Option<&ModuleError> {
        self.errors.get(&module)
    }

    /// Whether `compute()` ran for a module during this call.
    pub fn was_executed(&self, module: ModuleId) -> bool {
        self.executed.get(&module).copied().unwrap_or(false)
    }

    /// Number of modules whose `compute()` ran.
    pub fn executed_count(&self) -> usize {
        self.executed.values().filter(|e| **e).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_falls_back_to_identity() {
        let options = ExecuteOptions::new().with_remap(ModuleId::new(1), ModuleId::new(10));
        assert_eq!(options.remap(ModuleId::new(1)), ModuleId::new(10));
        assert_eq!(options.remap(ModuleId::new(2)), ModuleId::new(2));
    }

    #[test]
    fn result_helpers() {
        let mut result = ExecutionResult {
            execution_id: ExecutionId::new(),
            objects: BTreeMap::new(),
            errors: BTreeMap::new(),
            executed: BTreeMap::new(),
            modules_added: BTreeSet::new(),
            connections_added: BTreeSet::new(),
        };
        let id = ModuleId::new(0);
        result.objects.insert(
            id,
            ModuleHandle {
                persistent_id: PersistentId::new(0),
                signature: Signature::from_bytes([0; 32]),
                outputs: BTreeMap::from([("value".to_string(), Value::int(3))]),
            },
        );
        result.executed.insert(id, true);

        assert!(result.is_success());
        assert_eq!(result.output(id, "value"), Some(&Value::int(3)));
        assert!(result.output(id, "other").is_none());
        assert!(result.was_executed(id));
        assert!(!result.was_executed(ModuleId::new(5)));
        assert_eq!(result.executed_count(), 1);

        result.errors.insert(
            id,
            ModuleError {
                persistent_id: PersistentId::new(0),
                key: "kiln.basic:Fail".into(),
                error: ComputeError::failed("boom"),
            },
        );
        assert!(!result.is_success());
        assert_eq!(result.error(id).unwrap().to_string(), "kiln.basic:Fail (persistent_0): boom");
    }
}
