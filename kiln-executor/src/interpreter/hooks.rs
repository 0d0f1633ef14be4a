//! Execution callbacks.

use kiln_core::error::ComputeError;
use kiln_core::types::{ExecutionId, ModuleId, PersistentId};
use std::collections::BTreeSet;

/// A module finished updating within one execution.
#[derive(Debug, Clone, Copy)]
pub struct ModuleDone<'a> {
    /// The execution.
    pub execution_id: ExecutionId,
    /// The cached module.
    pub persistent_id: PersistentId,
    /// Caller ids (after remapping) that resolved to this module.
    pub module_ids: &'a [ModuleId],
    /// `true` when `compute()` ran, `false` for a cache hit or a failure.
    pub computed: bool,
    /// The error, when the module failed.
    pub error: Option<&'a ComputeError>,
}

/// Observer for one `execute()` call.
///
/// All methods default to no-ops. Hooks run on the calling thread while the
/// interpreter is borrowed, so they must not call back into it.
pub trait ExecutionHook: Send + Sync {
    /// The merge finished; `added` holds the caller ids that created new
    /// cache entries.
    fn modules_summoned(&self, _execution_id: ExecutionId, _added: &BTreeSet<ModuleId>) {}

    /// A module finished updating. Fired once per cached module per call.
    fn module_done(&self, _event: &ModuleDone<'_>) {}

    /// Every requested sink has been updated. Fired before failed modules
    /// are rolled back.
    fn sinks_updated(&self, _execution_id: ExecutionId, _sinks: &[ModuleId]) {}
}
