//! Merging an ephemeral pipeline into the persistent pipeline.

use super::CachedInterpreter;
use crate::adapter;
use crate::cache::{Connector, LiveModule, PersistentConnection};
use kiln_core::error::{KilnError, Result};
use kiln_core::logging::{LogCategory, LogEvent};
use kiln_core::pipeline::Pipeline;
use kiln_core::signature::{Signature, SignatureIndex};
use kiln_core::traits::ModuleFactory;
use kiln_core::types::{ConnectionId, ModuleId, PersistentConnectionId, PersistentId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::instrument;

/// How a caller's pipeline maps onto the persistent pipeline.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Local module id to cache entry.
    pub module_map: BTreeMap<ModuleId, PersistentId>,
    /// Local connection id to cache entry.
    pub connection_map: BTreeMap<ConnectionId, PersistentConnectionId>,
    /// Local modules that created a new cache entry.
    pub modules_added: BTreeSet<ModuleId>,
    /// Local connections that created a new cache entry.
    pub connections_added: BTreeSet<ConnectionId>,
    /// Subpipeline signature of every local module.
    pub signatures: BTreeMap<ModuleId, Signature>,
}

struct ModulePlan {
    id: ModuleId,
    signature: Signature,
    factory: Arc<dyn ModuleFactory>,
    parameters: Vec<(String, Connector)>,
}

impl CachedInterpreter {
    /// Merge `pipeline` into the cache without executing anything.
    ///
    /// Every structural check runs before the cache is touched. If applying
    /// the plan or the optional signature validation still fails, the
    /// modules this call inserted are removed again, so an `Err` leaves the
    /// cache as it was. The merge is strictly additive.
    #[instrument(
        skip(self, pipeline),
        fields(
            modules = pipeline.module_count(),
            connections = pipeline.connection_count(),
        )
    )]
    pub fn merge(&mut self, pipeline: &Pipeline, reason: Option<&str>) -> Result<MergeOutcome> {
        let registry = Arc::clone(&self.registry);
        let order = pipeline.topological_order()?;

        let mut factories: HashMap<ModuleId, Arc<dyn ModuleFactory>> = HashMap::new();
        let mut parameters: HashMap<ModuleId, Vec<(String, Connector)>> = HashMap::new();
        for &id in &order {
            let descriptor = pipeline
                .module(id)
                .ok_or(KilnError::ModuleNotFound { module_id: id })?;
            let factory = registry.resolve(&descriptor.key)?;
            parameters.insert(
                id,
                adapter::parameter_connectors(id, descriptor, factory.info())?,
            );
            factories.insert(id, factory);
        }

        for (_, conn) in pipeline.connections() {
            check_port(pipeline, &factories, conn.source, &conn.source_port, true)?;
            check_port(pipeline, &factories, conn.destination, &conn.destination_port, false)?;
        }

        let mut index = SignatureIndex::with_registry(pipeline, &*registry);
        let mut plans = Vec::with_capacity(order.len());
        for &id in &order {
            let signature = index.subpipeline_signature(id)?;
            let (Some(factory), Some(params)) = (factories.remove(&id), parameters.remove(&id))
            else {
                return Err(KilnError::ModuleNotFound { module_id: id });
            };
            plans.push(ModulePlan {
                id,
                signature,
                factory,
                parameters: params,
            });
        }

        let position: HashMap<ModuleId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut edges = Vec::with_capacity(pipeline.connection_count());
        for (id, conn) in pipeline.connections() {
            let rank = position.get(&conn.destination).copied().unwrap_or(usize::MAX);
            edges.push((rank, id, index.connection_signature(id)?));
        }
        edges.sort_by_key(|(rank, id, _)| (*rank, *id));
        drop(index);

        let mut outcome = MergeOutcome::default();
        let mut inserted = Vec::new();
        let applied = self
            .apply(pipeline, plans, edges, reason, &mut outcome, &mut inserted)
            .and_then(|()| {
                if self.config.validate_signatures {
                    self.cache.compute_signatures(&*registry)
                } else {
                    Ok(())
                }
            });
        if let Err(err) = applied {
            self.undo_inserts(&inserted);
            return Err(err);
        }

        tracing::debug!(
            modules_added = outcome.modules_added.len(),
            connections_added = outcome.connections_added.len(),
            cached_modules = self.cache.len(),
            "Pipeline merged"
        );
        Ok(outcome)
    }

    /// Insert planned modules and connections that have no cache entry yet.
    /// `inserted` collects new persistent module ids as they are created.
    fn apply(
        &mut self,
        pipeline: &Pipeline,
        plans: Vec<ModulePlan>,
        edges: Vec<(usize, ConnectionId, Signature)>,
        reason: Option<&str>,
        outcome: &mut MergeOutcome,
        inserted: &mut Vec<PersistentId>,
    ) -> Result<()> {
        let log = self.log_context();
        for plan in plans {
            outcome.signatures.insert(plan.id, plan.signature);
            let persistent = match self.cache.module_id_for_signature(&plan.signature) {
                Some(existing) => existing,
                None => {
                    let descriptor = pipeline
                        .module(plan.id)
                        .ok_or(KilnError::ModuleNotFound { module_id: plan.id })?
                        .clone();
                    let mut live = LiveModule::new(
                        descriptor,
                        plan.factory.info().clone(),
                        plan.factory.create(),
                        reason.map(str::to_string),
                    );
                    for (port, connector) in plan.parameters {
                        live.add_connector(port, connector);
                    }
                    let key = live.key().to_string();
                    let persistent = self.cache.add_module(plan.signature, live);
                    inserted.push(persistent);
                    log.log(
                        LogEvent::debug(LogCategory::Cache, "module_added")
                            .with_persistent_id(persistent)
                            .with_module_id(plan.id)
                            .with_field("module", key)
                            .with_field("signature", plan.signature.short()),
                    );
                    outcome.modules_added.insert(plan.id);
                    persistent
                }
            };
            outcome.module_map.insert(plan.id, persistent);
        }

        for (_, id, signature) in edges {
            let persistent = match self.cache.connection_id_for_signature(&signature) {
                Some(existing) => existing,
                None => {
                    let conn = pipeline
                        .connection(id)
                        .ok_or(KilnError::ConnectionNotFound { connection_id: id })?;
                    let source = mapped(outcome, conn.source)?;
                    let destination = mapped(outcome, conn.destination)?;
                    let persistent = self.cache.add_connection(
                        signature,
                        PersistentConnection {
                            source,
                            source_port: conn.source_port.clone(),
                            destination,
                            destination_port: conn.destination_port.clone(),
                        },
                    )?;
                    outcome.connections_added.insert(id);
                    persistent
                }
            };
            outcome.connection_map.insert(id, persistent);
        }
        Ok(())
    }

    /// Remove modules inserted by a failed merge, newest first. A new cache
    /// connection always ends at a new module, so this drops them too.
    fn undo_inserts(&mut self, inserted: &[PersistentId]) {
        for &id in inserted.iter().rev() {
            if let Err(err) = self.cache.remove_module(id) {
                tracing::warn!(persistent_id = %id, error = %err, "Failed to undo merge insert");
            }
        }
        tracing::debug!(removed = inserted.len(), "Merge rolled back");
    }
}

fn check_port(
    pipeline: &Pipeline,
    factories: &HashMap<ModuleId, Arc<dyn ModuleFactory>>,
    module: ModuleId,
    port: &str,
    output: bool,
) -> Result<()> {
    let factory = factories
        .get(&module)
        .ok_or(KilnError::ModuleNotFound { module_id: module })?;
    let info = factory.info();
    let declared = if output {
        info.output(port).is_some()
    } else {
        info.input(port).is_some()
    };
    if declared {
        return Ok(());
    }
    let key = pipeline
        .module(module)
        .map(|d| d.key.to_string())
        .unwrap_or_default();
    Err(KilnError::InvalidPort {
        module_id: module,
        key,
        port: port.to_string(),
    })
}

fn mapped(outcome: &MergeOutcome, id: ModuleId) -> Result<PersistentId> {
    outcome
        .module_map
        .get(&id)
        .copied()
        .ok_or(KilnError::ModuleNotFound { module_id: id })
}
