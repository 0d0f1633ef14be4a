//! Content signatures for modules, subpipelines and connections.
//!
//! A module's *subpipeline signature* hashes its own descriptor together with
//! the subpipeline signatures of everything feeding it, Merkle style. Two
//! modules with the same subpipeline signature compute the same thing and are
//! shared in the cache.
//!
//! Every hashed field is length-prefixed, and each kind of signature starts
//! with its own domain tag, so distinct inputs never collide by concatenation.

use crate::error::{KilnError, Result};
use crate::pipeline::ModuleDescriptor;
use crate::traits::ModuleRegistry;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

const MODULE_TAG: &[u8] = b"kiln/module/v1";
const SUBPIPELINE_TAG: &[u8] = b"kiln/subpipeline/v1";
const CONNECTION_TAG: &[u8] = b"kiln/connection/v1";

/// A SHA-256 content signature.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "hex::serde")] [u8; 32]);

impl Signature {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex characters, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.short())
    }
}

/// Both endpoints of an edge.
#[derive(Debug, Clone, Copy)]
pub struct Endpoints<'a, N> {
    /// Upstream node.
    pub source: N,
    /// Upstream output port.
    pub source_port: &'a str,
    /// Downstream node.
    pub destination: N,
    /// Downstream input port.
    pub destination_port: &'a str,
}

/// Read-only view of a module graph that can be signed.
///
/// Implemented by the ephemeral pipeline (local ids) and by the persistent
/// pipeline (persistent ids), so one hashing routine serves both the merge and
/// the cache consistency check.
pub trait Topology {
    /// Module key type.
    type Node: Copy + Eq + Hash + fmt::Debug;
    /// Connection key type.
    type Edge: Copy + Eq + Hash + fmt::Debug;

    /// Descriptor of a module.
    fn descriptor(&self, node: Self::Node) -> Option<&ModuleDescriptor>;

    /// Edges ending at `node`.
    fn incoming_edges(&self, node: Self::Node) -> Vec<Self::Edge>;

    /// Endpoints of an edge.
    fn endpoints(&self, edge: Self::Edge) -> Option<Endpoints<'_, Self::Node>>;

    /// Error for a node that does not exist.
    fn missing_node(&self, node: Self::Node) -> KilnError;

    /// Error for an edge that does not exist.
    fn missing_edge(&self, edge: Self::Edge) -> KilnError;
}

/// Memoizing signature calculator for one topology.
///
/// Create one index per pipeline per merge. Results are cached for the
/// lifetime of the index and are never shared with another topology.
pub struct SignatureIndex<'a, T: Topology> {
    topology: &'a T,
    registry: Option<&'a dyn ModuleRegistry>,
    modules: HashMap<T::Node, Signature>,
    subpipelines: HashMap<T::Node, Signature>,
    connections: HashMap<T::Edge, Signature>,
    in_progress: HashSet<T::Node>,
}

impl<'a, T: Topology> SignatureIndex<'a, T> {
    /// Index without declared port types.
    pub fn new(topology: &'a T) -> Self {
        Self {
            topology,
            registry: None,
            modules: HashMap::new(),
            subpipelines: HashMap::new(),
            connections: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Index that folds declared input port types into module signatures.
    pub fn with_registry(topology: &'a T, registry: &'a dyn ModuleRegistry) -> Self {
        let mut index = Self::new(topology);
        index.registry = Some(registry);
        index
    }

    /// Signature of a module's own descriptor.
    pub fn module_signature(&mut self, node: T::Node) -> Result<Signature> {
        if let Some(sig) = self.modules.get(&node) {
            return Ok(*sig);
        }
        let descriptor = self
            .topology
            .descriptor(node)
            .ok_or_else(|| self.topology.missing_node(node))?;

        let info = match self.registry {
            Some(registry) => Some(registry.declared_ports(&descriptor.key)?),
            None => None,
        };

        let mut hasher = Sha256::new();
        hasher.update(MODULE_TAG);
        field(&mut hasher, descriptor.key.package.as_bytes());
        field(&mut hasher, descriptor.key.name.as_bytes());
        field(&mut hasher, descriptor.key.namespace.as_bytes());
        count(&mut hasher, descriptor.functions.len());
        for function in &descriptor.functions {
            field(&mut hasher, function.name.as_bytes());
            let port_signature = info
                .as_ref()
                .and_then(|i| i.input(&function.name))
                .map(|p| p.signature_string())
                .unwrap_or_default();
            field(&mut hasher, port_signature.as_bytes());
            count(&mut hasher, function.params.len());
            for param in &function.params {
                field(&mut hasher, &param.canonical_bytes());
            }
        }

        let sig = Signature(hasher.finalize().into());
        self.modules.insert(node, sig);
        Ok(sig)
    }

    /// Signature of a module and everything upstream of it.
    ///
    /// Incoming connections contribute `(destination port, source port,
    /// upstream subpipeline signature)` triples, sorted and de-duplicated, so
    /// the result does not depend on local id numbering or connection order.
    pub fn subpipeline_signature(&mut self, node: T::Node) -> Result<Signature> {
        if let Some(sig) = self.subpipelines.get(&node) {
            return Ok(*sig);
        }
        if !self.in_progress.insert(node) {
            return Err(KilnError::SignatureIndexCorrupted {
                cause: format!("cycle through {node:?}"),
            });
        }
        let result = self.compute_subpipeline(node);
        self.in_progress.remove(&node);

        let sig = result?;
        self.subpipelines.insert(node, sig);
        Ok(sig)
    }

    fn compute_subpipeline(&mut self, node: T::Node) -> Result<Signature> {
        let own = self.module_signature(node)?;

        let mut upstream: Vec<(String, String, Signature)> = Vec::new();
        for edge in self.topology.incoming_edges(node) {
            let ends = self
                .topology
                .endpoints(edge)
                .ok_or_else(|| self.topology.missing_edge(edge))?;
            let (source, source_port, destination_port) = (
                ends.source,
                ends.source_port.to_string(),
                ends.destination_port.to_string(),
            );
            let source_sig = self.subpipeline_signature(source)?;
            upstream.push((destination_port, source_port, source_sig));
        }
        upstream.sort();
        upstream.dedup();

        let mut hasher = Sha256::new();
        hasher.update(SUBPIPELINE_TAG);
        hasher.update(own.0);
        count(&mut hasher, upstream.len());
        for (destination_port, source_port, source_sig) in &upstream {
            field(&mut hasher, destination_port.as_bytes());
            field(&mut hasher, source_port.as_bytes());
            hasher.update(source_sig.0);
        }
        Ok(Signature(hasher.finalize().into()))
    }

    /// Signature of a connection, derived from its endpoints' subpipelines.
    pub fn connection_signature(&mut self, edge: T::Edge) -> Result<Signature> {
        if let Some(sig) = self.connections.get(&edge) {
            return Ok(*sig);
        }
        let ends = self
            .topology
            .endpoints(edge)
            .ok_or_else(|| self.topology.missing_edge(edge))?;
        let (source, source_port, destination, destination_port) = (
            ends.source,
            ends.source_port.to_string(),
            ends.destination,
            ends.destination_port.to_string(),
        );

        let source_sig = self.subpipeline_signature(source)?;
        let destination_sig = self.subpipeline_signature(destination)?;

        let mut hasher = Sha256::new();
        hasher.update(CONNECTION_TAG);
        hasher.update(source_sig.0);
        field(&mut hasher, source_port.as_bytes());
        hasher.update(destination_sig.0);
        field(&mut hasher, destination_port.as_bytes());

        let sig = Signature(hasher.finalize().into());
        self.connections.insert(edge, sig);
        Ok(sig)
    }

    /// Number of memoized subpipeline signatures.
    pub fn cached_subpipelines(&self) -> usize {
        self.subpipelines.len()
    }
}

fn field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn count(hasher: &mut Sha256, n: usize) {
    hasher.update((n as u64).to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ModuleDescriptor, ModuleKey, Pipeline};
    use crate::traits::{ModuleInfo, Port, PortType, Registry};
    use crate::types::ModuleId;
    use crate::value::Value;

    fn source(value: i64) -> ModuleDescriptor {
        ModuleDescriptor::new(ModuleKey::new("kiln.basic", "IntegerSource")).with_param("value", value)
    }

    fn add(b: i64) -> ModuleDescriptor {
        ModuleDescriptor::new(ModuleKey::new("kiln.basic", "Add")).with_param("b", b)
    }

    fn chain(first_id: u32, value: i64, b: i64) -> (Pipeline, ModuleId, ModuleId) {
        let mut p = Pipeline::new();
        let m = ModuleId::new(first_id);
        let n = ModuleId::new(first_id + 10);
        p.add_module_with_id(n, add(b)).unwrap();
        p.add_module_with_id(m, source(value)).unwrap();
        p.connect(m, "value", n, "a").unwrap();
        (p, m, n)
    }

    #[test]
    fn signatures_ignore_id_numbering() {
        let (p1, m1, n1) = chain(0, 1, 1);
        let (p2, m2, n2) = chain(40, 1, 1);
        let mut i1 = SignatureIndex::new(&p1);
        let mut i2 = SignatureIndex::new(&p2);

        assert_eq!(
            i1.subpipeline_signature(m1).unwrap(),
            i2.subpipeline_signature(m2).unwrap()
        );
        assert_eq!(
            i1.subpipeline_signature(n1).unwrap(),
            i2.subpipeline_signature(n2).unwrap()
        );
        let c1 = p1.incoming(n1)[0];
        let c2 = p2.incoming(n2)[0];
        assert_eq!(
            i1.connection_signature(c1).unwrap(),
            i2.connection_signature(c2).unwrap()
        );
    }

    #[test]
    fn parameter_change_propagates_downstream() {
        let (p1, m1, n1) = chain(0, 1, 1);
        let (p2, m2, n2) = chain(0, 2, 1);
        let mut i1 = SignatureIndex::new(&p1);
        let mut i2 = SignatureIndex::new(&p2);

        assert_ne!(i1.module_signature(m1).unwrap(), i2.module_signature(m2).unwrap());
        // Add's own descriptor is unchanged, its subpipeline is not.
        assert_eq!(i1.module_signature(n1).unwrap(), i2.module_signature(n2).unwrap());
        assert_ne!(
            i1.subpipeline_signature(n1).unwrap(),
            i2.subpipeline_signature(n2).unwrap()
        );
    }

    #[test]
    fn no_false_sharing_between_ports() {
        let mut p = Pipeline::new();
        let src = p.add_module(source(1));
        let x = p.add_module(add(0));
        let y = p.add_module(add(0));
        p.connect(src, "value", x, "a").unwrap();
        p.connect(src, "value", y, "b").unwrap();

        let mut index = SignatureIndex::new(&p);
        assert_ne!(
            index.subpipeline_signature(x).unwrap(),
            index.subpipeline_signature(y).unwrap()
        );
    }

    #[test]
    fn float_parameters_do_not_collide_with_null() {
        let float_source = |value: Value| {
            ModuleDescriptor::new(ModuleKey::new("kiln.basic", "FloatSource")).with_param("value", value)
        };
        let mut p = Pipeline::new();
        let large = p.add_module(float_source(Value::float(f64::MAX).unwrap()));
        let small = p.add_module(float_source(Value::float(f64::MIN).unwrap()));
        let null = p.add_module(float_source(Value::null()));

        let mut index = SignatureIndex::new(&p);
        let signatures = [large, small, null].map(|id| index.subpipeline_signature(id).unwrap());
        assert_ne!(signatures[0], signatures[1]);
        assert_ne!(signatures[0], signatures[2]);
        assert_ne!(signatures[1], signatures[2]);
        assert_eq!(Value::float(f64::INFINITY), None);
    }

    #[test]
    fn identical_modules_share_signature() {
        let mut p = Pipeline::new();
        let a = p.add_module(source(5));
        let b = p.add_module(source(5));
        let mut index = SignatureIndex::new(&p);
        assert_eq!(
            index.subpipeline_signature(a).unwrap(),
            index.subpipeline_signature(b).unwrap()
        );
        assert_eq!(index.cached_subpipelines(), 2);
    }

    #[test]
    fn package_name_and_namespace_are_separated() {
        let mut p = Pipeline::new();
        let a = p.add_module(ModuleDescriptor::new(ModuleKey::new("ab", "c")));
        let b = p.add_module(ModuleDescriptor::new(ModuleKey::new("a", "bc")));
        let c = p.add_module(ModuleDescriptor::new(ModuleKey::new("a", "bc").with_namespace("x")));
        let mut index = SignatureIndex::new(&p);
        let sa = index.module_signature(a).unwrap();
        let sb = index.module_signature(b).unwrap();
        let sc = index.module_signature(c).unwrap();
        assert_ne!(sa, sb);
        assert_ne!(sb, sc);
    }

    #[test]
    fn missing_ids_are_errors() {
        let p = Pipeline::new();
        let mut index = SignatureIndex::new(&p);
        let err = index.subpipeline_signature(ModuleId::new(3)).unwrap_err();
        assert_eq!(err.code(), "E102");
        let err = index
            .connection_signature(crate::types::ConnectionId::new(0))
            .unwrap_err();
        assert_eq!(err.code(), "E103");
    }

    #[test]
    fn registry_port_types_feed_module_signature() {
        let registry = Registry::new();
        registry.register_fn(
            ModuleInfo::new("kiln.basic", "Add")
                .with_inputs(vec![
                    Port::input("a", PortType::Float),
                    Port::input("b", PortType::Float),
                ])
                .with_outputs(vec![Port::output("result", PortType::Float)]),
            || unreachable!("not instantiated"),
        );

        let mut p = Pipeline::new();
        let n = p.add_module(add(1));
        let plain = SignatureIndex::new(&p).module_signature(n).unwrap();
        let typed = SignatureIndex::with_registry(&p, &registry)
            .module_signature(n)
            .unwrap();
        assert_ne!(plain, typed);
    }

    #[test]
    fn unknown_module_with_registry_is_error() {
        let registry = Registry::new();
        let mut p = Pipeline::new();
        let n = p.add_module(add(1));
        let err = SignatureIndex::with_registry(&p, &registry)
            .module_signature(n)
            .unwrap_err();
        assert_eq!(err.code(), "E101");
    }

    #[test]
    fn signature_formats() {
        let sig = Signature::from_bytes([0xab; 32]);
        assert_eq!(sig.to_hex().len(), 64);
        assert_eq!(sig.short(), "abababababab");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{}\"", sig.to_hex()));
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }
}
