//! Live module instances and their input connectors.

use kiln_core::pipeline::{ModuleDescriptor, ModuleKey};
use kiln_core::traits::{Module, ModuleInfo};
use kiln_core::types::PersistentId;
use kiln_core::value::Value;
use std::collections::BTreeMap;

/// One entry of a live module's input port list.
#[derive(Debug, Clone, PartialEq)]
pub enum Connector {
    /// Reads `port` of another cached module. Holds the id, not the module.
    Port {
        /// Upstream module.
        source: PersistentId,
        /// Upstream output port.
        port: String,
    },
    /// Constant produced by a parameter adapter.
    Parameter(Value),
}

impl Connector {
    /// Upstream module, for port connectors.
    pub fn source(&self) -> Option<PersistentId> {
        match self {
            Self::Port { source, .. } => Some(*source),
            Self::Parameter(_) => None,
        }
    }
}

/// A module instance owned by the persistent pipeline.
///
/// State machine: unbuilt (`up_to_date == false`) -> computing (inside
/// `compute()`) -> fresh (`up_to_date == true`). Leaving the cache is the only
/// way back, so a fresh module stays fresh for as long as it is cached.
pub struct LiveModule {
    pub(crate) descriptor: ModuleDescriptor,
    pub(crate) info: ModuleInfo,
    pub(crate) module: Box<dyn Module>,
    pub(crate) input_ports: BTreeMap<String, Vec<Connector>>,
    pub(crate) output_ports: BTreeMap<String, Value>,
    pub(crate) up_to_date: bool,
    pub(crate) reason: Option<String>,
    pub(crate) compute_count: u64,
}

impl LiveModule {
    /// Wrap a freshly created module instance.
    pub fn new(
        descriptor: ModuleDescriptor,
        info: ModuleInfo,
        module: Box<dyn Module>,
        reason: Option<String>,
    ) -> Self {
        Self {
            descriptor,
            info,
            module,
            input_ports: BTreeMap::new(),
            output_ports: BTreeMap::new(),
            up_to_date: false,
            reason,
            compute_count: 0,
        }
    }

    /// Registry key.
    pub fn key(&self) -> &ModuleKey {
        &self.descriptor.key
    }

    /// Descriptor this instance was created from.
    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// Declared ports.
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Whether the last compute succeeded and nothing invalidated it since.
    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date
    }

    /// Audit label given when the module was created.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// How many times `compute()` succeeded on this instance.
    pub fn compute_count(&self) -> u64 {
        self.compute_count
    }

    /// Whether results may be served from cache on a later call.
    pub fn is_cacheable(&self) -> bool {
        self.module.is_cacheable()
    }

    /// Last computed value of an output port.
    pub fn output(&self, port: &str) -> Option<&Value> {
        self.output_ports.get(port)
    }

    /// All computed outputs.
    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.output_ports
    }

    /// Connectors per input port, in arrival order.
    pub fn input_ports(&self) -> &BTreeMap<String, Vec<Connector>> {
        &self.input_ports
    }

    /// Append a connector to an input port.
    pub fn add_connector(&mut self, port: impl Into<String>, connector: Connector) {
        self.input_ports.entry(port.into()).or_default().push(connector);
    }

    /// Distinct upstream modules, ordered by input port name, then by
    /// connector order within a port.
    pub fn upstream(&self) -> Vec<PersistentId> {
        let mut seen = Vec::new();
        for connector in self.input_ports.values().flatten() {
            if let Some(source) = connector.source() {
                if !seen.contains(&source) {
                    seen.push(source);
                }
            }
        }
        seen
    }

    /// Drop outputs and the fresh flag, keeping the instance.
    pub fn invalidate(&mut self) {
        self.up_to_date = false;
        self.output_ports.clear();
    }

    /// Release everything the instance holds.
    pub fn clear(&mut self) {
        self.invalidate();
        self.input_ports.clear();
        self.module.clear();
    }
}

impl std::fmt::Debug for LiveModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveModule")
            .field("key", &self.descriptor.key)
            .field("up_to_date", &self.up_to_date)
            .field("reason", &self.reason)
            .field("compute_count", &self.compute_count)
            .finish()
    }
}
