//! The cached interpreter.
//!
//! ## Execution of one call
//!
//! 1. Modules that refuse caching are purged, together with their dependents
//! 2. The caller's pipeline is merged into the persistent pipeline; modules
//!    whose subpipeline signature is already cached are reused as-is
//! 3. Each sink is updated on demand; fresh modules are served from cache
//! 4. Results are snapshotted, then every module that failed is rolled back
//!    so the next call retries it
//!
//! Module failures never abort the call. Only structural problems (unknown
//! module, undeclared port, cycle, corrupted index) surface as `Err`.

mod hooks;
mod invalidate;
mod merge;
mod result;
mod update;

pub use hooks::{ExecutionHook, ModuleDone};
pub use merge::MergeOutcome;
pub use result::{ExecuteOptions, ExecutionResult, ModuleError, ModuleHandle};

use crate::cache::PersistentPipeline;
use crate::config::InterpreterConfig;
use kiln_core::error::{KilnError, Result};
use kiln_core::logging::{BufferedCollector, LogCategory, LogContext, LogEvent};
use kiln_core::pipeline::Pipeline;
use kiln_core::traits::ModuleRegistry;
use kiln_core::types::{ExecutionId, ModuleId, PersistentId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::instrument;
use update::RunState;

/// Interpreter that keeps computed modules alive between calls.
pub struct CachedInterpreter {
    registry: Arc<dyn ModuleRegistry>,
    cache: PersistentPipeline,
    config: InterpreterConfig,
    log: Arc<BufferedCollector>,
    current_execution: Option<ExecutionId>,
}

impl CachedInterpreter {
    /// Create an interpreter with default configuration.
    pub fn new(registry: Arc<dyn ModuleRegistry>) -> Self {
        Self::with_config(registry, InterpreterConfig::default())
    }

    /// Create an interpreter with explicit configuration.
    pub fn with_config(registry: Arc<dyn ModuleRegistry>, config: InterpreterConfig) -> Self {
        let log = Arc::new(BufferedCollector::new(config.log_capacity));
        Self {
            registry,
            cache: PersistentPipeline::new(),
            config,
            log,
            current_execution: None,
        }
    }

    /// The persistent pipeline.
    pub fn cache(&self) -> &PersistentPipeline {
        &self.cache
    }

    /// Configuration in effect.
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Registry used to instantiate modules.
    pub fn registry(&self) -> &Arc<dyn ModuleRegistry> {
        &self.registry
    }

    /// Structured event log.
    pub fn log(&self) -> &Arc<BufferedCollector> {
        &self.log
    }

    fn log_context(&self) -> LogContext {
        let ctx = LogContext::new(self.log.clone());
        match self.current_execution {
            Some(id) => ctx.with_execution_id(id),
            None => ctx,
        }
    }

    /// Execute `pipeline`, updating `sinks` (all pipeline sinks when `None`).
    ///
    /// Module failures are reported in [`ExecutionResult::errors`]; the call
    /// itself only fails on structural errors, in which case the cache is left
    /// as it was after the non-cacheable purge.
    #[instrument(
        skip(self, pipeline, sinks, options),
        fields(
            execution_id = tracing::field::Empty,
            modules = pipeline.module_count(),
            connections = pipeline.connection_count(),
        )
    )]
    pub fn execute(
        &mut self,
        pipeline: &Pipeline,
        sinks: Option<&[ModuleId]>,
        options: ExecuteOptions,
    ) -> Result<ExecutionResult> {
        let execution_id = ExecutionId::new();
        tracing::Span::current().record("execution_id", tracing::field::display(execution_id));
        self.current_execution = Some(execution_id);
        let result = self.execute_inner(execution_id, pipeline, sinks, &options);
        self.current_execution = None;
        result
    }

    fn execute_inner(
        &mut self,
        execution_id: ExecutionId,
        pipeline: &Pipeline,
        sinks: Option<&[ModuleId]>,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult> {
        let sinks = match sinks {
            Some(sinks) => sinks.to_vec(),
            None => pipeline.sinks(),
        };
        if let Some(missing) = sinks.iter().find(|id| !pipeline.contains(**id)) {
            return Err(KilnError::ModuleNotFound { module_id: *missing });
        }

        let log = self.log_context();
        log.log(
            LogEvent::info(LogCategory::Execution, "execute_started")
                .with_field("modules", pipeline.module_count())
                .with_field("sinks", sinks.len()),
        );

        self.clean_non_cacheable_modules()?;

        let reason = options
            .reason
            .clone()
            .or_else(|| self.config.default_reason.clone());
        let outcome = self.merge(pipeline, reason.as_deref())?;

        let added: std::collections::BTreeSet<ModuleId> = outcome
            .modules_added
            .iter()
            .map(|id| options.remap(*id))
            .collect();
        for hook in &options.hooks {
            hook.modules_summoned(execution_id, &added);
        }

        let mut locals: HashMap<PersistentId, Vec<ModuleId>> = HashMap::new();
        for (local, persistent) in &outcome.module_map {
            locals
                .entry(*persistent)
                .or_default()
                .push(options.remap(*local));
        }

        let mut run = RunState::new(
            execution_id,
            log.clone(),
            &options.hooks,
            locals,
            self.config.catch_panics,
        );
        for sink in &sinks {
            if let Some(&persistent) = outcome.module_map.get(sink) {
                // Failures are recorded in `run`; siblings keep going.
                let _ = run.update(&mut self.cache, persistent);
            }
        }

        let reported_sinks: Vec<ModuleId> = sinks.iter().map(|id| options.remap(*id)).collect();
        for hook in &options.hooks {
            hook.sinks_updated(execution_id, &reported_sinks);
        }

        let mut objects = BTreeMap::new();
        let mut errors = BTreeMap::new();
        let mut executed = BTreeMap::new();
        for (local, persistent) in &outcome.module_map {
            let reported = options.remap(*local);
            let Some(signature) = outcome.signatures.get(local).copied() else {
                continue;
            };
            let outputs = self
                .cache
                .module(*persistent)
                .map(|m| m.outputs().clone())
                .unwrap_or_default();
            objects.insert(
                reported,
                ModuleHandle {
                    persistent_id: *persistent,
                    signature,
                    outputs,
                },
            );
            executed.insert(reported, run.was_computed(*persistent));
            if let Some(error) = run.failure(*persistent) {
                let key = pipeline
                    .module(*local)
                    .map(|d| d.key.to_string())
                    .unwrap_or_default();
                errors.insert(
                    reported,
                    ModuleError {
                        persistent_id: *persistent,
                        key,
                        error: error.clone(),
                    },
                );
            }
        }

        let failed = run.failed_modules();
        let computed = run.computed_count();
        drop(run);
        if !failed.is_empty() {
            let removed = self.clean_modules(failed)?;
            log.log(
                LogEvent::warn(LogCategory::Execution, "rollback")
                    .with_field("removed", removed.len()),
            );
        }

        log.log(
            LogEvent::info(LogCategory::Execution, "execute_finished")
                .with_field("computed", computed)
                .with_field("errors", errors.len()),
        );
        tracing::info!(
            computed,
            errors = errors.len(),
            modules_added = outcome.modules_added.len(),
            "Execution finished"
        );

        Ok(ExecutionResult {
            execution_id,
            objects,
            errors,
            executed,
            modules_added: outcome
                .modules_added
                .iter()
                .map(|id| options.remap(*id))
                .collect(),
            connections_added: outcome.connections_added,
        })
    }

    /// Clear the cache and log the shutdown.
    pub fn shutdown(mut self) {
        let removed = self.cache.clear();
        self.log_context().info(LogCategory::System, "shutdown");
        tracing::info!(removed, "Interpreter shut down");
    }
}

impl std::fmt::Debug for CachedInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedInterpreter")
            .field("cached_modules", &self.cache.len())
            .field("cached_connections", &self.cache.connection_count())
            .field("config", &self.config)
            .finish()
    }
}
