//! Demand-driven module updates.

use super::hooks::{ExecutionHook, ModuleDone};
use crate::cache::{Connector, PersistentPipeline};
use kiln_core::error::ComputeError;
use kiln_core::logging::{BEGIN_UPDATE, END_UPDATE, LogCategory, LogContext, LogEvent, UPDATE_CACHED};
use kiln_core::traits::ComputeContext;
use kiln_core::types::{ExecutionId, ModuleId, PersistentId};
use kiln_core::value::Value;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Bookkeeping for the updates of one `execute()` call.
pub(crate) struct RunState<'h> {
    execution_id: ExecutionId,
    log: LogContext,
    hooks: &'h [Arc<dyn ExecutionHook>],
    locals: HashMap<PersistentId, Vec<ModuleId>>,
    catch_panics: bool,
    failures: BTreeMap<PersistentId, ComputeError>,
    computed: BTreeSet<PersistentId>,
    finished: HashSet<PersistentId>,
}

impl<'h> RunState<'h> {
    pub(crate) fn new(
        execution_id: ExecutionId,
        log: LogContext,
        hooks: &'h [Arc<dyn ExecutionHook>],
        locals: HashMap<PersistentId, Vec<ModuleId>>,
        catch_panics: bool,
    ) -> Self {
        Self {
            execution_id,
            log,
            hooks,
            locals,
            catch_panics,
            failures: BTreeMap::new(),
            computed: BTreeSet::new(),
            finished: HashSet::new(),
        }
    }

    pub(crate) fn was_computed(&self, id: PersistentId) -> bool {
        self.computed.contains(&id)
    }

    pub(crate) fn computed_count(&self) -> usize {
        self.computed.len()
    }

    pub(crate) fn failure(&self, id: PersistentId) -> Option<&ComputeError> {
        self.failures.get(&id)
    }

    pub(crate) fn failed_modules(&self) -> Vec<PersistentId> {
        self.failures.keys().copied().collect()
    }

    /// Bring `id` up to date, pulling its upstream modules first.
    ///
    /// Each module is processed at most once per call; later requests get the
    /// memoized outcome, so a failing subtree is never recomputed.
    pub(crate) fn update(
        &mut self,
        cache: &mut PersistentPipeline,
        id: PersistentId,
    ) -> Result<(), ComputeError> {
        if self.finished.contains(&id) {
            return match self.failures.get(&id) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            };
        }

        let Some(upstream) = cache.module(id).map(|m| m.upstream()) else {
            let err = ComputeError::failed(format!("{id} is not cached"));
            return self.fail(id, err);
        };

        for source in upstream {
            if let Err(err) = self.update(cache, source) {
                let root = match err {
                    ComputeError::UpstreamFailed { upstream } => upstream,
                    _ => source,
                };
                return self.fail(id, ComputeError::UpstreamFailed { upstream: root });
            }
        }

        let pruned = prune_stale_connectors(cache, id);
        if pruned > 0 {
            tracing::debug!(persistent_id = %id, pruned, "Pruned stale connectors");
        }

        if cache.is_up_to_date(id) {
            self.event(LogEvent::debug(LogCategory::Module, UPDATE_CACHED), id);
            self.done(id, false, None);
            return Ok(());
        }

        self.compute(cache, id)
    }

    fn compute(&mut self, cache: &mut PersistentPipeline, id: PersistentId) -> Result<(), ComputeError> {
        let inputs = gather_inputs(cache, id);
        let Some(live) = cache.module_mut(id) else {
            return self.fail(id, ComputeError::failed(format!("{id} is not cached")));
        };
        let key = live.key().to_string();

        self.event(
            LogEvent::info(LogCategory::Module, BEGIN_UPDATE).with_field("module", key.clone()),
            id,
        );
        let span = tracing::debug_span!("module_update", persistent_id = %id, module = %key);
        let _entered = span.enter();

        let instance = &mut live.module;
        let mut ctx = ComputeContext::new(id, &live.info, &inputs);
        let outcome = if self.catch_panics {
            panic::catch_unwind(AssertUnwindSafe(|| instance.compute(&mut ctx))).unwrap_or_else(
                |payload| {
                    Err(ComputeError::Panicked {
                        message: panic_message(payload.as_ref()),
                    })
                },
            )
        } else {
            instance.compute(&mut ctx)
        };
        let outputs = ctx.into_outputs();

        match outcome {
            Ok(()) => {
                live.output_ports = outputs;
                live.up_to_date = true;
                live.compute_count += 1;
                self.computed.insert(id);
                self.event(
                    LogEvent::info(LogCategory::Module, END_UPDATE)
                        .with_field("module", key)
                        .with_field("computed", true),
                    id,
                );
                tracing::debug!("Module computed");
                self.done(id, true, None);
                Ok(())
            }
            Err(err) => {
                live.invalidate();
                tracing::warn!(error = %err, "Module failed");
                self.fail(id, err)
            }
        }
    }

    fn fail(&mut self, id: PersistentId, err: ComputeError) -> Result<(), ComputeError> {
        self.event(
            LogEvent::error(LogCategory::Module, END_UPDATE)
                .with_field("error", err.to_string())
                .with_field("upstream", err.is_upstream()),
            id,
        );
        self.failures.insert(id, err.clone());
        self.done(id, false, Some(&err));
        Err(err)
    }

    fn event(&self, event: LogEvent, id: PersistentId) {
        let mut event = event.with_persistent_id(id);
        if let Some(local) = self.locals.get(&id).and_then(|ids| ids.first()) {
            event = event.with_module_id(*local);
        }
        self.log.log(event);
    }

    fn done(&mut self, id: PersistentId, computed: bool, error: Option<&ComputeError>) {
        if !self.finished.insert(id) {
            return;
        }
        let module_ids = self.locals.get(&id).map(Vec::as_slice).unwrap_or(&[]);
        let event = ModuleDone {
            execution_id: self.execution_id,
            persistent_id: id,
            module_ids,
            computed,
            error,
        };
        for hook in self.hooks {
            hook.module_done(&event);
        }
    }
}

/// Drop port connectors whose source has not produced the port.
fn prune_stale_connectors(cache: &mut PersistentPipeline, id: PersistentId) -> usize {
    let Some(live) = cache.module(id) else {
        return 0;
    };
    let keep: BTreeMap<String, Vec<bool>> = live
        .input_ports()
        .iter()
        .map(|(port, connectors)| {
            let mask = connectors
                .iter()
                .map(|c| match c {
                    Connector::Parameter(_) => true,
                    Connector::Port { source, port } => cache.output(*source, port).is_some(),
                })
                .collect();
            (port.clone(), mask)
        })
        .collect();

    let Some(live) = cache.module_mut(id) else {
        return 0;
    };
    let mut pruned = 0;
    for (port, connectors) in live.input_ports.iter_mut() {
        let Some(mask) = keep.get(port) else {
            continue;
        };
        let mut flags = mask.iter();
        connectors.retain(|_| {
            let keep = flags.next().copied().unwrap_or(true);
            if !keep {
                pruned += 1;
            }
            keep
        });
    }
    pruned
}

/// Values currently readable through each input port, in arrival order.
fn gather_inputs(cache: &PersistentPipeline, id: PersistentId) -> BTreeMap<String, Vec<Value>> {
    let Some(live) = cache.module(id) else {
        return BTreeMap::new();
    };
    live.input_ports()
        .iter()
        .map(|(port, connectors)| {
            let values = connectors
                .iter()
                .filter_map(|c| cache.read_connector(c))
                .collect();
            (port.clone(), values)
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_extracted() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");

        let payload = panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
