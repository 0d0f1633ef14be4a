//! Module trait and related types.

use crate::error::ComputeError;
use crate::pipeline::ModuleKey;
use crate::types::PersistentId;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    /// Input port.
    Input,
    /// Output port.
    Output,
}

/// Element type of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    /// Any type (no validation).
    Any,
    /// Integer.
    Integer,
    /// Integer or float.
    Float,
    /// String.
    String,
    /// Boolean.
    Boolean,
    /// List of any type.
    List,
}

impl PortType {
    /// Check whether a value fits this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Integer => value.as_i64().is_some(),
            Self::Float => value.as_f64().is_some(),
            Self::String => value.as_str().is_some(),
            Self::Boolean => value.as_bool().is_some(),
            Self::List => value.inner().is_array(),
        }
    }

    /// Lowercase type name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::List => "list",
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A port on a module.
///
/// An input port's `signature` lists the element types a parameter-setting
/// function must supply: one entry for a plain port, several for a tuple
/// port. Output ports carry a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port name (e.g., "value", "a", "result").
    pub name: String,
    /// Port direction.
    pub direction: PortDirection,
    /// Type signature.
    pub signature: Vec<PortType>,
    /// Whether the port may be left unconnected.
    #[serde(default)]
    pub optional: bool,
    /// Description of the port.
    #[serde(default)]
    pub description: String,
}

impl Port {
    /// Create a required single-value input port.
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            signature: vec![port_type],
            optional: false,
            description: String::new(),
        }
    }

    /// Create a required input port fed by a multi-parameter function.
    pub fn tuple_input(name: impl Into<String>, signature: Vec<PortType>) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            signature,
            optional: false,
            description: String::new(),
        }
    }

    /// Create an output port.
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            signature: vec![port_type],
            optional: true,
            description: String::new(),
        }
    }

    /// Set the port as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Set the port description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Whether values on this port are packed tuples.
    pub fn is_tuple(&self) -> bool {
        self.signature.len() > 1
    }

    /// Canonical text form of the signature, e.g. `(integer,integer)`.
    pub fn signature_string(&self) -> String {
        let parts: Vec<&str> = self.signature.iter().map(PortType::name).collect();
        format!("({})", parts.join(","))
    }
}

/// Metadata about a module type: its key and declared ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Registry key.
    pub key: ModuleKey,
    /// Description of what the module does.
    #[serde(default)]
    pub description: String,
    /// Input ports.
    pub inputs: Vec<Port>,
    /// Output ports.
    pub outputs: Vec<Port>,
}

impl ModuleInfo {
    /// Create module info with no ports.
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: ModuleKey::new(package, name),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.key = self.key.with_namespace(namespace);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Set input ports.
    pub fn with_inputs(mut self, inputs: Vec<Port>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Set output ports.
    pub fn with_outputs(mut self, outputs: Vec<Port>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Get an input port by name.
    pub fn input(&self, name: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Get an output port by name.
    pub fn output(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Everything a module sees while computing.
///
/// Inputs are the values currently readable through the module's connectors,
/// grouped by port in connection arrival order. Outputs written here are only
/// published to the cache when `compute()` returns `Ok`.
pub struct ComputeContext<'a> {
    persistent_id: PersistentId,
    info: &'a ModuleInfo,
    inputs: &'a BTreeMap<String, Vec<Value>>,
    outputs: BTreeMap<String, Value>,
}

impl<'a> ComputeContext<'a> {
    /// Create a context for one `compute()` call.
    pub fn new(
        persistent_id: PersistentId,
        info: &'a ModuleInfo,
        inputs: &'a BTreeMap<String, Vec<Value>>,
    ) -> Self {
        Self {
            persistent_id,
            info,
            inputs,
            outputs: BTreeMap::new(),
        }
    }

    /// Persistent id of the module being computed.
    pub fn persistent_id(&self) -> PersistentId {
        self.persistent_id
    }

    /// Declared ports of the module being computed.
    pub fn info(&self) -> &ModuleInfo {
        self.info
    }

    /// Whether at least one value arrived on `port`.
    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.get(port).is_some_and(|v| !v.is_empty())
    }

    /// First value on `port`.
    pub fn input(&self, port: &str) -> Option<&Value> {
        self.inputs.get(port).and_then(|v| v.first())
    }

    /// All values on `port`, in arrival order.
    pub fn inputs(&self, port: &str) -> &[Value] {
        self.inputs.get(port).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value on `port`, or [`ComputeError::MissingInput`].
    pub fn require(&self, port: &str) -> Result<&Value, ComputeError> {
        self.input(port)
            .ok_or_else(|| ComputeError::missing_input(port))
    }

    /// Required integer input.
    pub fn require_i64(&self, port: &str) -> Result<i64, ComputeError> {
        let value = self.require(port)?;
        value
            .as_i64()
            .ok_or_else(|| invalid_input(port, PortType::Integer, value))
    }

    /// Required numeric input.
    pub fn require_f64(&self, port: &str) -> Result<f64, ComputeError> {
        let value = self.require(port)?;
        value
            .as_f64()
            .ok_or_else(|| invalid_input(port, PortType::Float, value))
    }

    /// Required string input.
    pub fn require_str(&self, port: &str) -> Result<&str, ComputeError> {
        let value = self.require(port)?;
        value
            .as_str()
            .ok_or_else(|| invalid_input(port, PortType::String, value))
    }

    /// Write an output value. The port must be declared.
    pub fn set_output(&mut self, port: &str, value: impl Into<Value>) -> Result<(), ComputeError> {
        if self.info.output(port).is_none() {
            return Err(ComputeError::UndeclaredOutput {
                port: port.to_string(),
            });
        }
        self.outputs.insert(port.to_string(), value.into());
        Ok(())
    }

    /// Outputs written so far.
    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.outputs
    }

    /// Consume the context, returning the written outputs.
    pub fn into_outputs(self) -> BTreeMap<String, Value> {
        self.outputs
    }
}

fn invalid_input(port: &str, expected: PortType, found: &Value) -> ComputeError {
    ComputeError::InvalidInput {
        port: port.to_string(),
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

/// The core trait for all Kiln modules.
///
/// A module instance lives in the persistent pipeline for as long as its
/// signature stays cached. `compute()` reads inputs through the context and
/// writes outputs to it; a returned error is recorded against the module and
/// never aborts sibling sinks.
///
/// # Example
///
/// ```ignore
/// use kiln_core::prelude::*;
///
/// struct Double;
///
/// impl Module for Double {
///     fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError> {
///         let x = ctx.require_i64("value")?;
///         ctx.set_output("result", x * 2)
///     }
/// }
/// ```
pub trait Module: Send {
    /// Compute outputs from inputs.
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ComputeError>;

    /// Whether results may be served from cache on a later call.
    ///
    /// Evaluated per instance before every execution.
    fn is_cacheable(&self) -> bool {
        true
    }

    /// Release held resources. Called when the module leaves the cache.
    fn clear(&mut self) {}
}
