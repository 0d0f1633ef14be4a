//! Ephemeral pipelines.
//!
//! A [`Pipeline`] is what a caller hands to the interpreter: module
//! descriptors and connection descriptors addressed by local ids. It is
//! always a DAG, because [`Pipeline::connect`] refuses edges that would close
//! a cycle.

mod definition;
mod descriptor;

pub use definition::{
    ConnectionDefinition, DefinitionLimits, LoadedPipeline, MAX_DEFINITION_BYTES,
    ModuleDefinition, PipelineDefinition,
};
pub use descriptor::{ConnectionDescriptor, Function, ModuleDescriptor, ModuleKey};

use crate::error::{KilnError, Result};
use crate::graph::Dag;
use crate::signature::{Endpoints, Topology};
use crate::types::{ConnectionId, ModuleId};
use std::collections::BTreeMap;

/// A user-supplied DAG of modules and connections.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    modules: BTreeMap<ModuleId, ModuleDescriptor>,
    connections: BTreeMap<ConnectionId, ConnectionDescriptor>,
    /// Incoming connections per module, in insertion order.
    incoming: BTreeMap<ModuleId, Vec<ConnectionId>>,
    /// Outgoing connections per module, in insertion order.
    outgoing: BTreeMap<ModuleId, Vec<ConnectionId>>,
    graph: Dag<ModuleId>,
    next_module: u32,
    next_connection: u32,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module under the next free id.
    ///
    /// Ids past `u32::MAX` wrap around to the lowest unused id.
    pub fn add_module(&mut self, descriptor: ModuleDescriptor) -> ModuleId {
        let id = ModuleId::new(free_id(self.next_module, |n| {
            self.modules.contains_key(&ModuleId::new(n))
        }));
        self.insert_module(id, descriptor);
        id
    }

    /// Add a module under a caller-chosen id.
    pub fn add_module_with_id(&mut self, id: ModuleId, descriptor: ModuleDescriptor) -> Result<()> {
        if self.modules.contains_key(&id) {
            return Err(KilnError::DuplicateId {
                kind: "module",
                id: id.as_u32(),
            });
        }
        self.insert_module(id, descriptor);
        Ok(())
    }

    /// Callers guarantee `id` is unused.
    fn insert_module(&mut self, id: ModuleId, descriptor: ModuleDescriptor) {
        debug_assert!(!self.modules.contains_key(&id));
        self.next_module = self.next_module.max(id.as_u32().saturating_add(1));
        self.modules.insert(id, descriptor);
        self.incoming.insert(id, Vec::new());
        self.outgoing.insert(id, Vec::new());
        self.graph.add_node(id);
    }

    /// Connect `source.source_port` to `destination.destination_port`.
    pub fn connect(
        &mut self,
        source: ModuleId,
        source_port: impl Into<String>,
        destination: ModuleId,
        destination_port: impl Into<String>,
    ) -> Result<ConnectionId> {
        let id = ConnectionId::new(free_id(self.next_connection, |n| {
            self.connections.contains_key(&ConnectionId::new(n))
        }));
        let conn = ConnectionDescriptor::new(source, source_port, destination, destination_port);
        self.connect_with_id(id, conn)?;
        Ok(id)
    }

    /// Insert a connection under a caller-chosen id.
    pub fn connect_with_id(&mut self, id: ConnectionId, conn: ConnectionDescriptor) -> Result<()> {
        if self.connections.contains_key(&id) {
            return Err(KilnError::DuplicateId {
                kind: "connection",
                id: id.as_u32(),
            });
        }
        for endpoint in [conn.source, conn.destination] {
            if !self.modules.contains_key(&endpoint) {
                return Err(invalid_connection(&conn, format!("{endpoint} does not exist")));
            }
        }
        if self.graph.reaches(conn.destination, conn.source) {
            let mut modules: Vec<ModuleId> = self
                .graph
                .descendants([conn.destination])
                .intersection(&self.graph.ancestors(conn.source))
                .copied()
                .collect();
            modules.sort();
            return Err(KilnError::CycleDetected { modules });
        }

        self.next_connection = self.next_connection.max(id.as_u32().saturating_add(1));
        self.graph.add_edge(conn.source, conn.destination);
        self.outgoing.entry(conn.source).or_default().push(id);
        self.incoming.entry(conn.destination).or_default().push(id);
        self.connections.insert(id, conn);
        Ok(())
    }

    /// Replace the functions feeding one input port of a module.
    pub fn set_function(&mut self, module: ModuleId, function: Function) -> Result<()> {
        self.modules
            .get_mut(&module)
            .ok_or(KilnError::ModuleNotFound { module_id: module })?
            .set_function(function);
        Ok(())
    }

    /// Remove a module together with its incident connections.
    pub fn remove_module(&mut self, id: ModuleId) -> Result<ModuleDescriptor> {
        let descriptor = self
            .modules
            .remove(&id)
            .ok_or(KilnError::ModuleNotFound { module_id: id })?;

        let incident: Vec<ConnectionId> = self
            .incoming
            .remove(&id)
            .into_iter()
            .chain(self.outgoing.remove(&id))
            .flatten()
            .collect();
        for conn_id in incident {
            if let Some(conn) = self.connections.remove(&conn_id) {
                if let Some(list) = self.outgoing.get_mut(&conn.source) {
                    list.retain(|c| *c != conn_id);
                }
                if let Some(list) = self.incoming.get_mut(&conn.destination) {
                    list.retain(|c| *c != conn_id);
                }
            }
        }
        self.graph.remove_node(id);
        Ok(descriptor)
    }

    /// Remove a single connection.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Result<ConnectionDescriptor> {
        let conn = self
            .connections
            .remove(&id)
            .ok_or(KilnError::ConnectionNotFound { connection_id: id })?;
        if let Some(list) = self.outgoing.get_mut(&conn.source) {
            list.retain(|c| *c != id);
        }
        if let Some(list) = self.incoming.get_mut(&conn.destination) {
            list.retain(|c| *c != id);
        }
        self.graph.remove_edge(conn.source, conn.destination);
        Ok(conn)
    }

    /// Get a module descriptor.
    pub fn module(&self, id: ModuleId) -> Option<&ModuleDescriptor> {
        self.modules.get(&id)
    }

    /// Get a connection descriptor.
    pub fn connection(&self, id: ConnectionId) -> Option<&ConnectionDescriptor> {
        self.connections.get(&id)
    }

    /// All modules in id order.
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &ModuleDescriptor)> {
        self.modules.iter().map(|(id, m)| (*id, m))
    }

    /// All connections in id order.
    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &ConnectionDescriptor)> {
        self.connections.iter().map(|(id, c)| (*id, c))
    }

    /// Number of modules.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Number of connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether the pipeline has no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Check whether a module id exists.
    pub fn contains(&self, id: ModuleId) -> bool {
        self.modules.contains_key(&id)
    }

    /// Connections ending at `module`, in insertion order.
    pub fn incoming(&self, module: ModuleId) -> &[ConnectionId] {
        self.incoming.get(&module).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Connections starting at `module`, in insertion order.
    pub fn outgoing(&self, module: ModuleId) -> &[ConnectionId] {
        self.outgoing.get(&module).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Modules without outgoing connections.
    pub fn sinks(&self) -> Vec<ModuleId> {
        self.graph.sinks()
    }

    /// Modules ordered parents-before-children, ties broken by id.
    pub fn topological_order(&self) -> Result<Vec<ModuleId>> {
        self.graph
            .topological_sort()
            .map_err(|e| KilnError::CycleDetected { modules: e.nodes })
    }

    /// Underlying module graph.
    pub fn graph(&self) -> &Dag<ModuleId> {
        &self.graph
    }
}

fn invalid_connection(conn: &ConnectionDescriptor, cause: String) -> KilnError {
    KilnError::InvalidConnection {
        source_module: conn.source,
        source_port: conn.source_port.clone(),
        destination: conn.destination,
        destination_port: conn.destination_port.clone(),
        cause,
    }
}

impl Topology for Pipeline {
    type Node = ModuleId;
    type Edge = ConnectionId;

    fn descriptor(&self, node: ModuleId) -> Option<&ModuleDescriptor> {
        self.module(node)
    }

    fn incoming_edges(&self, node: ModuleId) -> Vec<ConnectionId> {
        self.incoming(node).to_vec()
    }

    fn endpoints(&self, edge: ConnectionId) -> Option<Endpoints<'_, ModuleId>> {
        self.connection(edge).map(|c| Endpoints {
            source: c.source,
            source_port: &c.source_port,
            destination: c.destination,
            destination_port: &c.destination_port,
        })
    }

    fn missing_node(&self, node: ModuleId) -> KilnError {
        KilnError::ModuleNotFound { module_id: node }
    }

    fn missing_edge(&self, edge: ConnectionId) -> KilnError {
        KilnError::ConnectionNotFound {
            connection_id: edge,
        }
    }
}

/// First id at or after `start`, wrapping at `u32::MAX`, for which `taken`
/// is false.
fn free_id(start: u32, taken: impl Fn(u32) -> bool) -> u32 {
    let mut id = start;
    while taken(id) {
        id = id.wrapping_add(1);
    }
    id
}
