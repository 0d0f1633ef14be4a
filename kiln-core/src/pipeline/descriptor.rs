//! Module and connection descriptors.

use crate::types::ModuleId;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry lookup key: the (package, name, namespace) triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleKey {
    /// Package identifier (e.g., "kiln.basic").
    pub package: String,
    /// Module name within the package (e.g., "Add").
    pub name: String,
    /// Optional namespace inside the package. Empty when unused.
    #[serde(default)]
    pub namespace: String,
}

impl ModuleKey {
    /// Create a key without a namespace.
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
            namespace: String::new(),
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}:{}", self.package, self.name)
        } else {
            write!(f, "{}:{}|{}", self.package, self.namespace, self.name)
        }
    }
}

/// A parameter-setting function.
///
/// A function feeds the input port it is named after. Its parameter list is
/// adapted to a single port value at wiring time: no parameters become null,
/// one parameter is passed through, several are packed into a tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Name of the input port this function sets.
    pub name: String,
    /// Ordered parameters.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Function {
    /// Create a function with the given parameters.
    pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = Value>) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
        }
    }

    /// Create a single-parameter function.
    pub fn single(name: impl Into<String>, param: impl Into<Value>) -> Self {
        Self::new(name, [param.into()])
    }
}

/// Description of one module inside a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Registry key.
    #[serde(flatten)]
    pub key: ModuleKey,
    /// Ordered parameter-setting functions.
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl ModuleDescriptor {
    /// Create a descriptor with no functions.
    pub fn new(key: ModuleKey) -> Self {
        Self {
            key,
            functions: Vec::new(),
        }
    }

    /// Append a function.
    pub fn with_function(mut self, function: Function) -> Self {
        self.functions.push(function);
        self
    }

    /// Append a single-parameter function.
    pub fn with_param(self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_function(Function::single(port, value))
    }

    /// Replace every function feeding `port` with `function`, keeping the
    /// position of the first replaced entry.
    pub fn set_function(&mut self, function: Function) {
        match self.functions.iter().position(|f| f.name == function.name) {
            Some(pos) => {
                self.functions[pos] = function;
                let name = self.functions[pos].name.clone();
                let mut seen = false;
                self.functions.retain(|f| {
                    if f.name != name {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.functions.push(function),
        }
    }
}

/// A connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Source module.
    pub source: ModuleId,
    /// Source output port.
    pub source_port: String,
    /// Destination module.
    pub destination: ModuleId,
    /// Destination input port.
    pub destination_port: String,
}

impl ConnectionDescriptor {
    /// Create a new connection descriptor.
    pub fn new(
        source: ModuleId,
        source_port: impl Into<String>,
        destination: ModuleId,
        destination_port: impl Into<String>,
    ) -> Self {
        Self {
            source,
            source_port: source_port.into(),
            destination,
            destination_port: destination_port.into(),
        }
    }
}
