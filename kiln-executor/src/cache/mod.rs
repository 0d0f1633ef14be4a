//! The persistent pipeline: live modules keyed by content signature.
//!
//! Every module and connection that survives between `execute()` calls lives
//! here. A module's persistent id maps one-to-one to its subpipeline
//! signature, and each connection's persistent id maps one-to-one to its
//! connection signature. Connectors refer to upstream modules by
//! [`PersistentId`], never by reference, so removing a module is a pure arena
//! operation.

mod live;

pub use live::{Connector, LiveModule};

use kiln_core::error::{KilnError, Result};
use kiln_core::graph::Dag;
use kiln_core::pipeline::ModuleDescriptor;
use kiln_core::signature::{Endpoints, Signature, SignatureIndex, Topology};
use kiln_core::traits::ModuleRegistry;
use kiln_core::types::{IdAllocator, PersistentConnectionId, PersistentId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A connection between two cached modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentConnection {
    /// Upstream module.
    pub source: PersistentId,
    /// Upstream output port.
    pub source_port: String,
    /// Downstream module.
    pub destination: PersistentId,
    /// Downstream input port.
    pub destination_port: String,
}

/// Arena of live modules plus the signature indices that make them reusable.
#[derive(Debug, Default)]
pub struct PersistentPipeline {
    modules: BTreeMap<PersistentId, LiveModule>,
    connections: BTreeMap<PersistentConnectionId, PersistentConnection>,
    incoming: BTreeMap<PersistentId, Vec<PersistentConnectionId>>,
    module_by_signature: HashMap<Signature, PersistentId>,
    signature_by_module: HashMap<PersistentId, Signature>,
    connection_by_signature: HashMap<Signature, PersistentConnectionId>,
    signature_by_connection: HashMap<PersistentConnectionId, Signature>,
    graph: Dag<PersistentId>,
    module_ids: IdAllocator,
    connection_ids: IdAllocator,
}

impl PersistentPipeline {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a module with this subpipeline signature is cached.
    pub fn has_module_signature(&self, signature: &Signature) -> bool {
        self.module_by_signature.contains_key(signature)
    }

    /// Persistent id of the module with this subpipeline signature.
    pub fn module_id_for_signature(&self, signature: &Signature) -> Option<PersistentId> {
        self.module_by_signature.get(signature).copied()
    }

    /// Insert a new live module under `signature` and return its fresh id.
    pub fn add_module(&mut self, signature: Signature, module: LiveModule) -> PersistentId {
        debug_assert!(
            !self.module_by_signature.contains_key(&signature),
            "module signature {signature:?} already cached"
        );
        let id = PersistentId::new(self.module_ids.next_raw());
        self.modules.insert(id, module);
        self.incoming.insert(id, Vec::new());
        self.module_by_signature.insert(signature, id);
        self.signature_by_module.insert(id, signature);
        self.graph.add_node(id);
        id
    }

    /// Whether a connection with this signature is cached.
    pub fn has_connection_signature(&self, signature: &Signature) -> bool {
        self.connection_by_signature.contains_key(signature)
    }

    /// Persistent id of the connection with this signature.
    pub fn connection_id_for_signature(
        &self,
        signature: &Signature,
    ) -> Option<PersistentConnectionId> {
        self.connection_by_signature.get(signature).copied()
    }

    /// Insert a connection between two cached modules.
    ///
    /// Also appends the matching port connector on the destination.
    pub fn add_connection(
        &mut self,
        signature: Signature,
        connection: PersistentConnection,
    ) -> Result<PersistentConnectionId> {
        if !self.modules.contains_key(&connection.source) {
            return Err(KilnError::PersistentModuleNotFound {
                persistent_id: connection.source,
            });
        }
        let destination = self.modules.get_mut(&connection.destination).ok_or(
            KilnError::PersistentModuleNotFound {
                persistent_id: connection.destination,
            },
        )?;
        destination.add_connector(
            connection.destination_port.clone(),
            Connector::Port {
                source: connection.source,
                port: connection.source_port.clone(),
            },
        );

        let id = PersistentConnectionId::new(self.connection_ids.next_raw());
        self.graph.add_edge(connection.source, connection.destination);
        self.incoming
            .entry(connection.destination)
            .or_default()
            .push(id);
        self.connections.insert(id, connection);
        self.connection_by_signature.insert(signature, id);
        self.signature_by_connection.insert(id, signature);
        Ok(id)
    }

    /// Remove one module that has no cached dependents.
    ///
    /// Drops the module's incoming connections, forgets its signature and
    /// calls [`LiveModule::clear`] on the instance.
    pub fn remove_module(&mut self, id: PersistentId) -> Result<LiveModule> {
        if !self.modules.contains_key(&id) {
            return Err(KilnError::PersistentModuleNotFound { persistent_id: id });
        }
        let dependents: Vec<PersistentId> = self.graph.successors(id).into_iter().collect();
        if !dependents.is_empty() {
            return Err(KilnError::RemoveWithDependents {
                persistent_id: id,
                dependents,
            });
        }

        for connection_id in self.incoming.remove(&id).unwrap_or_default() {
            if let Some(connection) = self.connections.remove(&connection_id) {
                self.graph.remove_edge(connection.source, connection.destination);
            }
            if let Some(signature) = self.signature_by_connection.remove(&connection_id) {
                self.connection_by_signature.remove(&signature);
            }
        }
        if let Some(signature) = self.signature_by_module.remove(&id) {
            self.module_by_signature.remove(&signature);
        }
        self.graph.remove_node(id);

        let mut module = self
            .modules
            .remove(&id)
            .ok_or(KilnError::PersistentModuleNotFound { persistent_id: id })?;
        module.clear();
        Ok(module)
    }

    /// `seeds` plus everything downstream of them.
    pub fn dependents_closure(
        &self,
        seeds: impl IntoIterator<Item = PersistentId>,
    ) -> BTreeSet<PersistentId> {
        self.graph.descendants(seeds)
    }

    /// Order `ids` so every module comes after all of its dependents.
    pub fn removal_order(&self, ids: &BTreeSet<PersistentId>) -> Result<Vec<PersistentId>> {
        self.graph
            .reverse_topological_subset(ids)
            .map_err(|cycle| KilnError::SignatureIndexCorrupted {
                cause: format!("cycle in persistent pipeline through {:?}", cycle.nodes),
            })
    }

    /// Recompute every signature from the cached structure and check both
    /// bijections.
    pub fn compute_signatures(&self, registry: &dyn ModuleRegistry) -> Result<()> {
        if self.module_by_signature.len() != self.modules.len()
            || self.signature_by_module.len() != self.modules.len()
        {
            return Err(KilnError::SignatureIndexCorrupted {
                cause: format!(
                    "{} modules but {} module signatures",
                    self.modules.len(),
                    self.module_by_signature.len()
                ),
            });
        }
        if self.connection_by_signature.len() != self.connections.len()
            || self.signature_by_connection.len() != self.connections.len()
        {
            return Err(KilnError::SignatureIndexCorrupted {
                cause: format!(
                    "{} connections but {} connection signatures",
                    self.connections.len(),
                    self.connection_by_signature.len()
                ),
            });
        }

        let mut index = SignatureIndex::with_registry(self, registry);
        for &id in self.modules.keys() {
            let actual = index.subpipeline_signature(id)?;
            let recorded = self.signature_by_module.get(&id).copied();
            if recorded != Some(actual) || self.module_by_signature.get(&actual) != Some(&id) {
                return Err(KilnError::SignatureIndexCorrupted {
                    cause: format!("{id} is indexed under {recorded:?}, structure gives {actual:?}"),
                });
            }
        }
        for &id in self.connections.keys() {
            let actual = index.connection_signature(id)?;
            let recorded = self.signature_by_connection.get(&id).copied();
            if recorded != Some(actual) || self.connection_by_signature.get(&actual) != Some(&id)
            {
                return Err(KilnError::SignatureIndexCorrupted {
                    cause: format!("{id} is indexed under {recorded:?}, structure gives {actual:?}"),
                });
            }
        }
        Ok(())
    }

    /// Look up a live module.
    pub fn module(&self, id: PersistentId) -> Option<&LiveModule> {
        self.modules.get(&id)
    }

    /// Look up a live module mutably.
    pub fn module_mut(&mut self, id: PersistentId) -> Option<&mut LiveModule> {
        self.modules.get_mut(&id)
    }

    /// Look up a cached connection.
    pub fn connection(&self, id: PersistentConnectionId) -> Option<&PersistentConnection> {
        self.connections.get(&id)
    }

    /// Current value behind a connector, if its source has produced it.
    pub fn read_connector(&self, connector: &Connector) -> Option<kiln_core::value::Value> {
        match connector {
            Connector::Parameter(value) => Some(value.clone()),
            Connector::Port { source, port } => self
                .modules
                .get(source)
                .and_then(|m| m.output(port))
                .cloned(),
        }
    }

    /// Subpipeline signature a module is indexed under.
    pub fn signature_of(&self, id: PersistentId) -> Option<Signature> {
        self.signature_by_module.get(&id).copied()
    }

    /// Creation reason of a module.
    pub fn reason_of(&self, id: PersistentId) -> Option<&str> {
        self.modules.get(&id).and_then(LiveModule::reason)
    }

    /// Whether a cached module is fresh.
    pub fn is_up_to_date(&self, id: PersistentId) -> bool {
        self.modules.get(&id).is_some_and(LiveModule::is_up_to_date)
    }

    /// Last computed value of a module's output port.
    pub fn output(&self, id: PersistentId, port: &str) -> Option<&kiln_core::value::Value> {
        self.modules.get(&id).and_then(|m| m.output(port))
    }

    /// Ids of all cached modules, ascending.
    pub fn module_ids(&self) -> impl Iterator<Item = PersistentId> + '_ {
        self.modules.keys().copied()
    }

    /// Ids of cached modules whose instances refuse caching.
    pub fn non_cacheable(&self) -> Vec<PersistentId> {
        self.modules
            .iter()
            .filter(|(_, m)| !m.is_cacheable())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Cached modules directly downstream of `id`.
    pub fn dependents(&self, id: PersistentId) -> BTreeSet<PersistentId> {
        self.graph.successors(id)
    }

    /// Number of cached modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the cache holds no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Number of cached connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether a module id is cached.
    pub fn contains(&self, id: PersistentId) -> bool {
        self.modules.contains_key(&id)
    }

    /// Drop every module and connection. Id allocation keeps counting.
    pub fn clear(&mut self) -> usize {
        let removed = self.modules.len();
        for module in self.modules.values_mut() {
            module.clear();
        }
        self.modules.clear();
        self.connections.clear();
        self.incoming.clear();
        self.module_by_signature.clear();
        self.signature_by_module.clear();
        self.connection_by_signature.clear();
        self.signature_by_connection.clear();
        self.graph = Dag::new();
        removed
    }
}

impl Topology for PersistentPipeline {
    type Node = PersistentId;
    type Edge = PersistentConnectionId;

    fn descriptor(&self, node: PersistentId) -> Option<&ModuleDescriptor> {
        self.modules.get(&node).map(LiveModule::descriptor)
    }

    fn incoming_edges(&self, node: PersistentId) -> Vec<PersistentConnectionId> {
        self.incoming.get(&node).cloned().unwrap_or_default()
    }

    fn endpoints(&self, edge: PersistentConnectionId) -> Option<Endpoints<'_, PersistentId>> {
        self.connections.get(&edge).map(|c| Endpoints {
            source: c.source,
            source_port: &c.source_port,
            destination: c.destination,
            destination_port: &c.destination_port,
        })
    }

    fn missing_node(&self, node: PersistentId) -> KilnError {
        KilnError::PersistentModuleNotFound {
            persistent_id: node,
        }
    }

    fn missing_edge(&self, edge: PersistentConnectionId) -> KilnError {
        KilnError::SignatureIndexCorrupted {
            cause: format!("{edge} is referenced but not cached"),
        }
    }
}
